//! 检查设备类型分类器
//!
//! 把医院系统里的自由文本检查名称映射到固定的 DICOM 设备类型代码。
//! 规则按表中顺序逐条匹配，第一条命中的规则生效；全部未命中时返回 [`DEFAULT_MODALITY`]。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 设备类型代码 (0008,0060)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modality {
    CT,
    US,
    MR,
    MG,
    XA,
    PT,
    ECG,
    EPS,
    ES,
    NM,
    SR,
    SC,
    XC,
    CR,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::CT => "CT",
            Modality::US => "US",
            Modality::MR => "MR",
            Modality::MG => "MG",
            Modality::XA => "XA",
            Modality::PT => "PT",
            Modality::ECG => "ECG",
            Modality::EPS => "EPS",
            Modality::ES => "ES",
            Modality::NM => "NM",
            Modality::SR => "SR",
            Modality::SC => "SC",
            Modality::XC => "XC",
            Modality::CR => "CR",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 未命中任何规则时的设备类型
pub const DEFAULT_MODALITY: Modality = Modality::CR;

/// 单个匹配条件，作用于大写后的检查名称
#[derive(Debug, Clone, Copy)]
pub enum Pattern {
    /// 任意位置包含
    Contains(&'static str),
    /// 以此开头
    Prefix(&'static str),
}

impl Pattern {
    fn matches(&self, upper: &str) -> bool {
        match self {
            Pattern::Contains(needle) => upper.contains(needle),
            Pattern::Prefix(prefix) => upper.starts_with(prefix),
        }
    }

    fn text(&self) -> &'static str {
        match self {
            Pattern::Contains(s) | Pattern::Prefix(s) => s,
        }
    }
}

/// 分类规则：任一条件命中即返回对应设备类型
#[derive(Debug)]
pub struct Rule {
    pub modality: Modality,
    pub patterns: &'static [Pattern],
}

use Pattern::{Contains, Prefix};

/// 有序规则表，顺序即优先级
pub static RULES: &[Rule] = &[
    Rule { modality: Modality::CT, patterns: &[Contains("CT SCAN"), Prefix("CT")] },
    Rule { modality: Modality::US, patterns: &[Contains("USG"), Contains("ULTRASOUND")] },
    Rule {
        modality: Modality::MR,
        patterns: &[Contains("MRI"), Prefix("MR"), Contains("MAGNETIC RESONANCE")],
    },
    Rule { modality: Modality::MG, patterns: &[Contains("MAMMO")] },
    Rule { modality: Modality::XA, patterns: &[Contains("ANGIO"), Contains("XA")] },
    Rule { modality: Modality::PT, patterns: &[Contains("PET"), Contains("POSITRON")] },
    Rule {
        modality: Modality::ECG,
        patterns: &[Contains("EKG"), Contains("ECG"), Contains("ELEKTROKARDIOGRAM")],
    },
    Rule { modality: Modality::EPS, patterns: &[Contains("EPS"), Contains("ELECTROPHYSIOLOGY")] },
    Rule {
        modality: Modality::ES,
        patterns: &[Contains("ENDOSCOPY"), Contains("ENDOSKOPI"), Contains("ES")],
    },
    Rule {
        modality: Modality::NM,
        patterns: &[Contains("NUKLIR"), Contains("NUCLEAR"), Contains("NM")],
    },
    Rule { modality: Modality::SR, patterns: &[Contains("SR"), Contains("STRUCTURED")] },
    Rule { modality: Modality::SC, patterns: &[Contains("SC"), Contains("SECONDARY CAPTURE")] },
    Rule { modality: Modality::XC, patterns: &[Contains("XC"), Contains("CINE")] },
    // 常规X线摄影部位
    Rule {
        modality: Modality::CR,
        patterns: &[
            Contains("BABYGRAM"),
            Contains("THORAX"),
            Contains("LUMBOSACRAL"),
            Contains("VERTEBRA"),
            Contains("PELVIS"),
            Contains("FEMUR"),
            Contains("HIP JOINT"),
            Contains("HUMERUS"),
            Contains("ANKLE"),
            Contains("WRIST"),
            Contains("MANUS"),
            Contains("SCAPULA"),
            Contains("CLAVICULA"),
            Contains("CRANIUM"),
            Contains("NASAL"),
            Contains("GENU"),
            Contains("CALCANEUS"),
            Contains("CRURIS"),
            Contains("ELBOW"),
            Contains("ANTEBRACHI"),
            Contains("BNO"),
            Contains("APPENDICOGRAM"),
            Contains("SACRUM"),
            Contains("COCCYGEUS"),
            Contains("ABDOMEN"),
            Contains("PEDIS"),
            Contains("SHOULDER"),
            Contains("SURVEY"),
            Contains("CHARGE"),
            Contains("PRINT FILM"),
            Contains("TOP LORDOTIK"),
            Contains("HSG"),
        ],
    },
];

/// 分类结果，`matched` 为命中的规则文本，走默认值时为 `None`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub modality: Modality,
    pub matched: Option<&'static str>,
}

/// 带命中信息的分类
pub fn classify_detailed(description: &str) -> Classification {
    let upper = description.trim().to_uppercase();

    for rule in RULES {
        if let Some(pattern) = rule.patterns.iter().find(|p| p.matches(&upper)) {
            return Classification {
                modality: rule.modality,
                matched: Some(pattern.text()),
            };
        }
    }

    Classification {
        modality: DEFAULT_MODALITY,
        matched: None,
    }
}

/// 把检查名称分类为设备类型，总是有结果
pub fn classify(description: &str) -> Modality {
    classify_detailed(description).modality
}
