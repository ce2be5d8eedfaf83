#[derive(Debug, Clone, PartialEq)]
pub enum StyleError {
    NotAnArray,
    InvalidPlugin {
        plugin: usize,
        reason: String,
    },
    InvalidDataConfig {
        plugin: usize,
        reason: String,
    },
    InvalidFilter {
        plugin: usize,
        rule: usize,
        reason: String,
    },
}

impl std::fmt::Display for StyleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StyleError::NotAnArray => write!(f, "style must be an array of plugin styles"),
            StyleError::InvalidPlugin { plugin, reason } => {
                write!(f, "invalid plugin style {plugin}: {reason}")
            }
            StyleError::InvalidDataConfig { plugin, reason } => {
                write!(f, "invalid dataConfig in plugin {plugin}: {reason}")
            }
            StyleError::InvalidFilter {
                plugin,
                rule,
                reason,
            } => write!(f, "invalid filter in plugin {plugin} rule {rule}: {reason}"),
        }
    }
}

impl std::error::Error for StyleError {}
