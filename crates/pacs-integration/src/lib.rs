//! # PACS集成模块
//!
//! 与影像归档 (Orthanc) 和影像浏览器的集成：
//! - 工作列表投递与 REST 查询
//! - 结构化报告文本提取与逐级解析链路
//! - 归档推送通知的解析校验
//! - 浏览链接生成与 HTTP 可达性检查

pub mod archive;
pub mod health;
pub mod memory;
pub mod orthanc;
pub mod resolution;
pub mod sr;
pub mod viewer;
pub mod webhook;

pub use archive::ArchiveClient;
pub use health::HttpHealthCheck;
pub use memory::InMemoryArchive;
pub use orthanc::OrthancClient;
pub use resolution::{resolve_report_content, ReportHint};
pub use sr::extract_report_text;
pub use viewer::ViewerLinks;
pub use webhook::ReportNotification;
