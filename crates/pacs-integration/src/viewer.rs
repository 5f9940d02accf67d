//! 影像浏览器 (OHIF) 链接

/// 根据 StudyInstanceUID 生成浏览链接
#[derive(Debug, Clone)]
pub struct ViewerLinks {
    base_url: String,
}

impl ViewerLinks {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn study_link(&self, study_instance_uid: &str) -> String {
        format!("{}/viewer?studyUID={}", self.base_url, study_instance_uid.trim())
    }
}
