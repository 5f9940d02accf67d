//! Modality Worklist 文件编码

use dicom::core::value::DataSetSequence;
use dicom::core::{DataElement, PrimitiveValue, Tag, VR};
use dicom::dictionary_std::tags;
use dicom::object::{FileMetaTableBuilder, InMemDicomObject};
use pacs_core::utils::{dicom_date, dicom_time};
use pacs_core::{Order, PacsError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// 企业根标识符
const UID_ROOT: &str = "1.2.826.0.1.3680043.9.7382.1";
const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";
const MODALITY_WORKLIST_FIND: &str = "1.2.840.10008.5.1.4.31";
/// Other Patient IDs (0010,1000)
const OTHER_PATIENT_IDS: Tag = Tag(0x0010, 0x1000);

/// 预约步骤中与订单无关的固定字段
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorklistDefaults {
    pub station_ae_title: String,
    pub station_name: String,
    pub performing_physician: String,
}

/// 由检查号派生的确定性实例UID，同一检查号重复生成结果相同
pub fn worklist_instance_uid(accession_number: &str) -> String {
    // FNV-1a
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in accession_number.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    format!("{}.{}", UID_ROOT, hash)
}

fn text(tag: Tag, vr: VR, value: impl Into<String>) -> DataElement<InMemDicomObject> {
    DataElement::new(tag, vr, PrimitiveValue::from(value.into()))
}

/// 工作列表文件写入器
#[derive(Debug, Clone)]
pub struct WorklistWriter {
    directory: PathBuf,
    defaults: WorklistDefaults,
}

impl WorklistWriter {
    pub fn new(directory: impl Into<PathBuf>, defaults: WorklistDefaults) -> Self {
        Self {
            directory: directory.into(),
            defaults,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// 检查号对应的文件路径，检查号即文件名
    pub fn path_for(&self, accession_number: &str) -> PathBuf {
        self.directory.join(format!("{}.wl", accession_number))
    }

    /// 构建工作列表数据集
    pub fn build_dataset(&self, order: &Order) -> InMemDicomObject {
        let mut step = InMemDicomObject::new_empty();
        step.put(text(tags::SCHEDULED_STATION_AE_TITLE, VR::AE, self.defaults.station_ae_title.as_str()));
        step.put(text(tags::SCHEDULED_PROCEDURE_STEP_START_DATE, VR::DA, dicom_date(order.scheduled_date)));
        step.put(text(tags::SCHEDULED_PROCEDURE_STEP_START_TIME, VR::TM, dicom_time(order.scheduled_time)));
        step.put(text(tags::MODALITY, VR::CS, order.modality.as_str()));
        step.put(text(
            tags::SCHEDULED_PERFORMING_PHYSICIAN_NAME,
            VR::PN,
            self.defaults.performing_physician.as_str(),
        ));
        step.put(text(
            tags::SCHEDULED_PROCEDURE_STEP_DESCRIPTION,
            VR::LO,
            order.procedure_description.as_str(),
        ));
        step.put(text(tags::SCHEDULED_PROCEDURE_STEP_ID, VR::SH, order.scheduled_step_id.as_str()));
        step.put(text(tags::SCHEDULED_STATION_NAME, VR::SH, self.defaults.station_name.as_str()));
        step.put(text(tags::SCHEDULED_PROCEDURE_STEP_STATUS, VR::CS, "SCHEDULED"));

        let birth_date = order.patient.birth_date.map(dicom_date).unwrap_or_default();

        let mut obj = InMemDicomObject::new_empty();
        obj.put(text(tags::SPECIFIC_CHARACTER_SET, VR::CS, "ISO_IR 192"));
        obj.put(text(tags::ACCESSION_NUMBER, VR::SH, order.accession_number.as_str()));
        obj.put(text(tags::MODALITY, VR::CS, order.modality.as_str()));
        obj.put(text(tags::PATIENT_NAME, VR::PN, order.patient.name.as_str()));
        // PatientID 承载申请单号，归档中的检查据此回溯到订单
        obj.put(text(tags::PATIENT_ID, VR::LO, order.order_id.as_str()));
        obj.put(text(OTHER_PATIENT_IDS, VR::LO, order.patient.medical_record_number.as_str()));
        obj.put(text(tags::PATIENT_BIRTH_DATE, VR::DA, birth_date));
        obj.put(text(tags::PATIENT_SEX, VR::CS, order.patient.sex.dicom_code()));
        obj.put(text(tags::REQUESTED_PROCEDURE_ID, VR::SH, order.procedure_code.as_str()));
        obj.put(text(
            tags::REQUESTED_PROCEDURE_DESCRIPTION,
            VR::LO,
            order.procedure_description.as_str(),
        ));
        obj.put(DataElement::new(
            tags::SCHEDULED_PROCEDURE_STEP_SEQUENCE,
            VR::SQ,
            DataSetSequence::from(vec![step]),
        ));
        obj
    }

    /// 写入 `<检查号>.wl`
    ///
    /// 先写临时文件再改名，读取方不会看到半个文件；重复写入覆盖同名文件。
    pub fn write(&self, order: &Order) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.directory)?;

        let dataset = self.build_dataset(order);
        let file_obj = dataset
            .with_meta(
                FileMetaTableBuilder::new()
                    .transfer_syntax(EXPLICIT_VR_LITTLE_ENDIAN)
                    .media_storage_sop_class_uid(MODALITY_WORKLIST_FIND)
                    .media_storage_sop_instance_uid(worklist_instance_uid(&order.accession_number)),
            )
            .map_err(|e| PacsError::Dicom(format!("无法构建文件元信息: {}", e)))?;

        let target = self.path_for(&order.accession_number);
        let staging = target.with_extension("wl.tmp");
        file_obj
            .write_to_file(&staging)
            .map_err(|e| PacsError::Dicom(format!("无法写入工作列表文件: {}", e)))?;
        std::fs::rename(&staging, &target)?;

        debug!("Worklist file written: {}", target.display());
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use dicom::object::open_file;
    use pacs_core::{OrderRequest, PatientIdentity, Sex};

    fn order() -> Order {
        Order::from_request(OrderRequest {
            order_id: "PR202401150001".to_string(),
            patient: PatientIdentity {
                medical_record_number: "000123".to_string(),
                name: "BUDI SANTOSO".to_string(),
                birth_date: NaiveDate::from_ymd_opt(1980, 5, 17),
                sex: Sex::Male,
            },
            procedure_code: "RAD001".to_string(),
            procedure_description: "CT SCAN KEPALA".to_string(),
            scheduled_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            scheduled_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        })
    }

    fn writer(dir: &Path) -> WorklistWriter {
        WorklistWriter::new(
            dir,
            WorklistDefaults {
                station_ae_title: "ORTHANC".to_string(),
                station_name: "RADIOLOGI".to_string(),
                performing_physician: "".to_string(),
            },
        )
    }

    fn read_str(obj: &InMemDicomObject, tag: Tag) -> String {
        obj.element(tag).unwrap().to_str().unwrap().trim_end().to_string()
    }

    #[test]
    fn test_worklist_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let order = order();
        let path = writer(dir.path()).write(&order).unwrap();

        assert_eq!(path, dir.path().join(format!("{}.wl", order.accession_number)));

        let obj = open_file(&path).unwrap();
        assert_eq!(read_str(&obj, tags::ACCESSION_NUMBER), order.accession_number);
        assert_eq!(read_str(&obj, tags::PATIENT_ID), "PR202401150001");
        assert_eq!(read_str(&obj, tags::PATIENT_SEX), "M");
        assert_eq!(read_str(&obj, tags::PATIENT_BIRTH_DATE), "19800517");
        assert_eq!(read_str(&obj, tags::MODALITY), "CT");

        let steps = obj
            .element(tags::SCHEDULED_PROCEDURE_STEP_SEQUENCE)
            .unwrap()
            .items()
            .unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(read_str(&steps[0], tags::SCHEDULED_PROCEDURE_STEP_START_DATE), "20240115");
        assert_eq!(read_str(&steps[0], tags::SCHEDULED_PROCEDURE_STEP_START_TIME), "093000");
        assert_eq!(read_str(&steps[0], tags::SCHEDULED_PROCEDURE_STEP_STATUS), "SCHEDULED");
        assert_eq!(read_str(&steps[0], tags::SCHEDULED_STATION_AE_TITLE), "ORTHANC");
    }

    #[test]
    fn test_rewrite_overwrites_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer(dir.path());
        let order = order();

        writer.write(&order).unwrap();
        writer.write(&order).unwrap();

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_instance_uid_is_deterministic_and_valid() {
        let a = worklist_instance_uid("CTPR2024011500012024011509");
        let b = worklist_instance_uid("CTPR2024011500012024011509");
        let c = worklist_instance_uid("MRPR2024011500012024011509");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.len() <= 64);
        assert!(a.chars().all(|ch| ch.is_ascii_digit() || ch == '.'));
    }
}
