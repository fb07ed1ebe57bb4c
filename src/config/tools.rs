//! Static registry of the mounted tools.
//!
//! Every tool has a fixed standalone port and a path prefix under the
//! dispatcher. The dashboard and the CLI both read from [`TOOLS`].

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

const MB: u64 = 1024 * 1024;
const GB: u64 = 1024 * MB;

/// Identifier of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Main,
    Toc,
    Pdf,
    Shift,
    Nametag,
    Transfer,
    Gigafile,
    Howto,
    Proofreading,
    Converter,
}

/// Registry entry describing one tool.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ToolInfo {
    pub kind: ToolKind,
    pub name: &'static str,
    pub display_name: &'static str,
    pub port: u16,
    pub path: &'static str,
    /// Maximum accepted request body in bytes, `None` for tools without uploads.
    pub max_upload: Option<u64>,
}

pub const TOOLS: &[ToolInfo] = &[
    ToolInfo {
        kind: ToolKind::Main,
        name: "main",
        display_name: "ダッシュボード",
        port: 8000,
        path: "/",
        max_upload: None,
    },
    ToolInfo {
        kind: ToolKind::Toc,
        name: "toc",
        display_name: "目次生成",
        port: 8001,
        path: "/toc",
        max_upload: Some(16 * MB),
    },
    ToolInfo {
        kind: ToolKind::Pdf,
        name: "pdf",
        display_name: "PDF処理",
        port: 8002,
        path: "/pdf",
        max_upload: Some(100 * MB),
    },
    ToolInfo {
        kind: ToolKind::Shift,
        name: "shift",
        display_name: "シフト管理",
        port: 8003,
        path: "/shift",
        max_upload: Some(MB),
    },
    ToolInfo {
        kind: ToolKind::Nametag,
        name: "nametag",
        display_name: "名札ツール",
        port: 8004,
        path: "/nametag",
        max_upload: Some(16 * MB),
    },
    ToolInfo {
        kind: ToolKind::Transfer,
        name: "transfer",
        display_name: "ファイル転送",
        port: 8005,
        path: "/transfer",
        max_upload: Some(2 * GB),
    },
    ToolInfo {
        kind: ToolKind::Gigafile,
        name: "gigafile",
        display_name: "大容量ファイル転送",
        port: 8006,
        path: "/gigafile",
        max_upload: Some(300 * GB),
    },
    ToolInfo {
        kind: ToolKind::Howto,
        name: "howto",
        display_name: "使い方ガイド",
        port: 8007,
        path: "/howto",
        max_upload: None,
    },
    ToolInfo {
        kind: ToolKind::Proofreading,
        name: "proofreading",
        display_name: "校正ツール",
        port: 8008,
        path: "/proofreading",
        max_upload: Some(500 * MB),
    },
    ToolInfo {
        kind: ToolKind::Converter,
        name: "converter",
        display_name: "変換ツール",
        port: 8009,
        path: "/converter",
        max_upload: Some(100 * MB),
    },
];

impl ToolKind {
    /// Registry entry for this tool.
    pub fn info(self) -> &'static ToolInfo {
        TOOLS
            .iter()
            .find(|t| t.kind == self)
            .unwrap_or(&TOOLS[0])
    }

    /// All tools that serve requests of their own (everything except the dashboard).
    pub fn mountable() -> impl Iterator<Item = &'static ToolInfo> {
        TOOLS.iter().filter(|t| t.kind != ToolKind::Main)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.info().name)
    }
}

impl FromStr for ToolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        TOOLS
            .iter()
            .find(|t| t.name == needle)
            .map(|t| t.kind)
            .ok_or_else(|| {
                let names: Vec<&str> = TOOLS.iter().map(|t| t.name).collect();
                format!("unknown tool '{}', expected one of: {}", s, names.join(", "))
            })
    }
}
