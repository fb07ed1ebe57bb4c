//! Usage guides for each tool.

use axum::extract::Path;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::error::ApiError;
use crate::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/api/howto/content/{page}", get(content))
}

#[derive(Debug, Clone, Serialize)]
pub struct GuidePage {
    pub slug: &'static str,
    pub title: &'static str,
    pub summary: &'static str,
    pub steps: &'static [&'static str],
}

pub const PAGES: &[GuidePage] = &[
    GuidePage {
        slug: "transfer",
        title: "ファイル転送",
        summary: "2GBまでのファイルを7日間共有できます。",
        steps: &[
            "ファイルを選択してアップロードします。",
            "表示されたダウンロードURLを相手に共有します。",
            "不要になったファイルは一覧から削除できます。",
        ],
    },
    GuidePage {
        slug: "gigafile",
        title: "大容量ファイル便",
        summary: "300GBまでのファイルをパスワード付きで共有できます。",
        steps: &[
            "ファイルと任意のパスワードを指定してアップロードします。",
            "ダウンロード時はURLの password パラメータにパスワードを付けます。",
            "保存期間を過ぎたファイルは自動的に削除されます。",
        ],
    },
    GuidePage {
        slug: "pdf",
        title: "PDF編集",
        summary: "PDFの結合、ページ分割、ページ抽出ができます。",
        steps: &[
            "結合: 複数のPDFを選択すると選択順に1つのPDFになります。",
            "分割: 1ページずつのPDFをまとめたZIPを受け取れます。",
            "抽出: 「1-3,5」のようにページ範囲を指定します。",
        ],
    },
    GuidePage {
        slug: "shift",
        title: "シフト表作成",
        summary: "人数と持ち場から15分刻みのローテーション表を作成します。",
        steps: &[
            "人数、必須ポジション、追加ポジション、勤務時間を入力します。",
            "休憩時間帯と休憩の長さを指定します。",
            "生成した表はExcelファイルとしてダウンロードできます。",
        ],
    },
    GuidePage {
        slug: "toc",
        title: "目次作成",
        summary: "PowerPointのスライドタイトルから目次を作成します。",
        steps: &[
            "PPTXファイルをアップロードします。",
            "項目ごとに文字サイズと太字を指定できます。",
        ],
    },
    GuidePage {
        slug: "nametag",
        title: "名札作成",
        summary: "Excelの名簿から名札のPDFを作成します。",
        steps: &[
            "「1行目」〜「10行目」の列を持つExcelファイルをアップロードします。",
            "カードの大きさ、文字サイズ、色、配置を選びます。",
            "プレビューを確認してPDFを作成します。",
        ],
    },
    GuidePage {
        slug: "converter",
        title: "ファイル変換",
        summary: "画像とPDFの形式を相互に変換します。",
        steps: &[
            "変換するファイルと出力形式を選びます。",
            "PDFへの変換では画質（high/medium/low）を指定できます。",
        ],
    },
    GuidePage {
        slug: "proofreading",
        title: "文章校正",
        summary: "日本語の文章を校正し、修正候補を色分けして表示します。",
        steps: &[
            "テキストを貼り付けるか、ファイルをアップロードします。",
            "赤は誤字、青は文法、黄色は表現の改善候補です。",
            "テーマを入力すると文章構成案を作成できます。",
        ],
    },
];

pub fn find_page(slug: &str) -> Option<&'static GuidePage> {
    PAGES.iter().find(|page| page.slug == slug)
}

#[derive(Debug, Serialize)]
struct IndexEntry {
    slug: &'static str,
    title: &'static str,
    summary: &'static str,
}

#[derive(Debug, Serialize)]
struct IndexResponse {
    pages: Vec<IndexEntry>,
}

async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        pages: PAGES
            .iter()
            .map(|p| IndexEntry {
                slug: p.slug,
                title: p.title,
                summary: p.summary,
            })
            .collect(),
    })
}

async fn content(Path(page): Path<String>) -> Result<Json<&'static GuidePage>, ApiError> {
    find_page(&page)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("ページが見つかりません: {}", page)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolKind;

    #[test]
    fn test_every_page_names_a_tool() {
        for page in PAGES {
            assert!(page.slug.parse::<ToolKind>().is_ok(), "{}", page.slug);
            assert!(!page.steps.is_empty());
        }
    }

    #[test]
    fn test_find_page() {
        assert_eq!(find_page("pdf").unwrap().title, "PDF編集");
        assert!(find_page("../secret").is_none());
    }
}
