use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    AssetAnalysis,
    ResidualAnalysis,
    ProjectSummary,
    #[default]
    General,
}

impl ReportType {
    pub const ALL: [ReportType; 4] = [
        ReportType::AssetAnalysis,
        ReportType::ResidualAnalysis,
        ReportType::ProjectSummary,
        ReportType::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::AssetAnalysis => "asset_analysis",
            ReportType::ResidualAnalysis => "residual_analysis",
            ReportType::ProjectSummary => "project_summary",
            ReportType::General => "general",
        }
    }

    /// Unrecognised names select the general report.
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(name.trim()))
            .unwrap_or_default()
    }

    /// File name stem of the generated artifact.
    pub fn file_stem(&self) -> &'static str {
        match self {
            ReportType::AssetAnalysis => "asset-analysis",
            ReportType::ResidualAnalysis => "residual-analysis",
            ReportType::ProjectSummary => "project-summary",
            ReportType::General => "general-report",
        }
    }
}

impl core::fmt::Display for ReportType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_names_fall_back_to_general() {
        assert_eq!(ReportType::from_name("asset_analysis"), ReportType::AssetAnalysis);
        assert_eq!(ReportType::from_name("Project_Summary"), ReportType::ProjectSummary);
        assert_eq!(ReportType::from_name("quarterly"), ReportType::General);
        assert_eq!(ReportType::from_name(""), ReportType::General);
    }
}
