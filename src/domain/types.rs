// ==========================================
// 采购阶段跟踪系统 - 领域类型定义
// ==========================================
// 依据: 采购跟踪业务规则 - 采购类型 / 风险等级 / 交货条款
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 采购类型 (Purchase Variant)
// ==========================================
// 决定记录适用的阶段子集 (国内 6 阶段 / 国际 13 阶段)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseVariant {
    Nacional,      // 国内采购
    Internacional, // 国际采购
}

impl fmt::Display for PurchaseVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl PurchaseVariant {
    /// 从字符串解析采购类型
    ///
    /// 未知值返回 None，由调用方决定是否回退
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "NACIONAL" => Some(PurchaseVariant::Nacional),
            "INTERNACIONAL" => Some(PurchaseVariant::Internacional),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            PurchaseVariant::Nacional => "NACIONAL",
            PurchaseVariant::Internacional => "INTERNACIONAL",
        }
    }
}

// ==========================================
// 风险等级 (Criticality Level)
// ==========================================
// 顺序: Low < Medium < High
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CriticalityLevel {
    Low,    // 正常
    Medium, // 关注
    High,   // 危险
}

impl fmt::Display for CriticalityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl CriticalityLevel {
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "MEDIUM" => CriticalityLevel::Medium,
            "HIGH" => CriticalityLevel::High,
            _ => CriticalityLevel::Low, // 默认值
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            CriticalityLevel::Low => "LOW",
            CriticalityLevel::Medium => "MEDIUM",
            CriticalityLevel::High => "HIGH",
        }
    }
}

// ==========================================
// 总体状态标签 (General Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GeneralStatus {
    OnTrack, // 按期
    Warning, // 预警
    Danger,  // 危险
}

impl fmt::Display for GeneralStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl GeneralStatus {
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "WARNING" => GeneralStatus::Warning,
            "DANGER" => GeneralStatus::Danger,
            _ => GeneralStatus::OnTrack,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            GeneralStatus::OnTrack => "ON_TRACK",
            GeneralStatus::Warning => "WARNING",
            GeneralStatus::Danger => "DANGER",
        }
    }
}

// ==========================================
// 交货条款 (Incoterm)
// ==========================================
// 仅在进入 FOB 阶段时记录; CIF 会触发国际运费询价阶段自动完成
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Incoterm {
    Exw,
    Fob,
    Cif,
    Dap,
    Ddp,
}

impl fmt::Display for Incoterm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl Incoterm {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "EXW" => Some(Incoterm::Exw),
            "FOB" => Some(Incoterm::Fob),
            "CIF" => Some(Incoterm::Cif),
            "DAP" => Some(Incoterm::Dap),
            "DDP" => Some(Incoterm::Ddp),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            Incoterm::Exw => "EXW",
            Incoterm::Fob => "FOB",
            Incoterm::Cif => "CIF",
            Incoterm::Dap => "DAP",
            Incoterm::Ddp => "DDP",
        }
    }
}

// ==========================================
// 调用方角色 (Caller Role)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallerRole {
    Supervisor,
    Admin,
    User,
}

impl CallerRole {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "SUPERVISOR" => CallerRole::Supervisor,
            "ADMIN" => CallerRole::Admin,
            _ => CallerRole::User,
        }
    }
}

/// 调用方身份 (由外部认证模块提供)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub identity: String,
    pub role: CallerRole,
}

impl Caller {
    pub fn new(identity: impl Into<String>, role: CallerRole) -> Self {
        Self {
            identity: identity.into(),
            role,
        }
    }

    /// 是否为主管/管理员
    pub fn is_supervisor_or_admin(&self) -> bool {
        matches!(self.role, CallerRole::Supervisor | CallerRole::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_parsing() {
        assert_eq!(PurchaseVariant::from_str("nacional"), Some(PurchaseVariant::Nacional));
        assert_eq!(
            PurchaseVariant::from_str(" INTERNACIONAL "),
            Some(PurchaseVariant::Internacional)
        );
        assert_eq!(PurchaseVariant::from_str("LOCAL"), None);
    }

    #[test]
    fn test_caller_privilege() {
        assert!(Caller::new("ana", CallerRole::Supervisor).is_supervisor_or_admin());
        assert!(Caller::new("root", CallerRole::Admin).is_supervisor_or_admin());
        assert!(!Caller::new("luis", CallerRole::User).is_supervisor_or_admin());
        assert_eq!(CallerRole::from_str("admin"), CallerRole::Admin);
        assert_eq!(CallerRole::from_str("COMPRAS"), CallerRole::User);
    }

    #[test]
    fn test_level_ordering() {
        assert!(CriticalityLevel::Low < CriticalityLevel::Medium);
        assert!(CriticalityLevel::Medium < CriticalityLevel::High);
        assert_eq!(CriticalityLevel::from_str("HIGH"), CriticalityLevel::High);
        assert_eq!(Incoterm::from_str("cif"), Some(Incoterm::Cif));
    }
}
