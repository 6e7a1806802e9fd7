// SPDX-License-Identifier: MIT
//! Meaning of TimeLog value slots
//!
//! Each `DLV` of the header declares one slot: a DDI logged for a device
//! element. The device element's object references lead to the process
//! data definition with the same DDI and its value presentation.

use crate::error::ReferenceError;
use crate::tree::{Document, NodeId};
use crate::value::ValueTranslation;

#[derive(Debug, Clone, PartialEq)]
pub struct ValueDescription {
    pub slot: usize,
    pub ddi: u16,
    pub device_element: NodeId,
    pub device_element_id: String,
    /// Matching `DPD` of the device, if one is referenced
    pub process_data: Option<NodeId>,
    pub designator: Option<String>,
    pub translation: ValueTranslation,
}

/// Resolve every `DLV` of `header` against the task document
pub fn describe_slots(
    task: &Document,
    header: &Document,
) -> Vec<Result<ValueDescription, ReferenceError>> {
    header
        .children_with_tag(header.root(), "DLV")
        .enumerate()
        .map(|(slot, dlv)| describe(task, header, slot, dlv))
        .collect()
}

fn describe(
    task: &Document,
    header: &Document,
    slot: usize,
    dlv: NodeId,
) -> Result<ValueDescription, ReferenceError> {
    let dlv = header.get(dlv);
    let ddi = dlv
        .i64_attr("processDataDdi")
        .and_then(|d| u16::try_from(d).ok())
        .ok_or_else(|| ReferenceError::Invalid("processDataDdi".to_string()))?;
    let det_id = dlv
        .str_attr("deviceElementIdRef")
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ReferenceError::Unset("deviceElementIdRef".to_string()))?;
    let det = task
        .node_by_id(det_id)
        .ok_or_else(|| ReferenceError::GlobalNotFound(det_id.to_string()))?;
    if task.get(det).tag() != "DET" {
        return Err(ReferenceError::WrongTarget {
            attribute: "deviceElementIdRef".to_string(),
            expected: "DET".to_string(),
            found: task.get(det).tag().to_string(),
        });
    }

    let mut description = ValueDescription {
        slot,
        ddi,
        device_element: det,
        device_element_id: det_id.to_string(),
        process_data: None,
        designator: None,
        translation: ValueTranslation::default(),
    };

    let dpd = task.children_with_tag(det, "DOR").find_map(|dor| {
        let target = task.resolve_tagged(dor, "deviceObjectId", "DPD").ok()?;
        (task.get(target).i64_attr("deviceProcessDataDdi") == Some(i64::from(ddi))).then_some(target)
    });
    if let Some(dpd) = dpd {
        let element = task.get(dpd);
        description.process_data = Some(dpd);
        description.designator = element
            .str_attr("deviceProcessDataDesignator")
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        if let Ok(dvp) = task.resolve_tagged(dpd, "deviceValuePresentationObjectId", "DVP") {
            description.translation = ValueTranslation::from_presentation(task.get(dvp));
        }
    }
    Ok(description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Section;

    const TASK: &str = r#"<ISO11783_TaskData VersionMajor="4" VersionMinor="3" DataTransferOrigin="1">
        <DVC A="DVC-1" D="A00084000D2C0A1B" F="01" G="01">
            <DET A="DET-1" B="1" C="1" E="0" F="0">
                <DOR A="10"/><DOR A="11"/>
            </DET>
            <DPD A="10" B="0084" C="1" D="8" E="Speed" F="20"/>
            <DPD A="11" B="0001" C="1" D="8" E="Rate"/>
            <DVP A="20" B="0" C="0.001" D="1" E="km/h"/>
        </DVC>
        <CTR A="CTR-1" B="Miller"/>
    </ISO11783_TaskData>"#;

    #[test]
    fn test_slots_follow_device_references() {
        let task = Document::parse("TASKDATA.XML", TASK, Section::TaskData).unwrap();
        let header = Document::parse(
            "TLG00001.xml",
            r#"<TIM A="" D="4">
                <DLV A="0084" C="DET-1"/>
                <DLV A="0001" C="DET-1"/>
                <DLV A="0002" C="DET-1"/>
                <DLV A="0002" C="DET-9"/>
                <DLV A="0002" C="CTR-1"/>
            </TIM>"#,
            Section::LogData,
        )
        .unwrap();

        let slots = describe_slots(&task, &header);
        assert_eq!(slots.len(), 5);

        let speed = slots[0].as_ref().unwrap();
        assert_eq!(speed.ddi, 0x84);
        assert_eq!(speed.device_element_id, "DET-1");
        assert_eq!(speed.designator.as_deref(), Some("Speed"));
        assert_eq!(speed.translation.format_with_unit(12_345), "12.3 km/h");

        let rate = slots[1].as_ref().unwrap();
        assert_eq!(rate.slot, 1);
        assert_eq!(rate.designator.as_deref(), Some("Rate"));
        assert_eq!(rate.translation, ValueTranslation::default());

        let undeclared = slots[2].as_ref().unwrap();
        assert_eq!(undeclared.process_data, None);

        assert_eq!(
            slots[3],
            Err(ReferenceError::GlobalNotFound("DET-9".to_string()))
        );
        assert!(matches!(slots[4], Err(ReferenceError::WrongTarget { .. })));
    }
}
