//! # DICOM工作列表模块
//!
//! 把预约订单编码为 Modality Worklist (MWL) 文件，供归档的工作列表插件读取。

pub mod worklist;

pub use worklist::{worklist_instance_uid, WorklistDefaults, WorklistWriter};
