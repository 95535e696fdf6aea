use axum::response::Html;

/// 画面は1枚のHTMLに埋め込み、APIへの呼び出しはすべてクライアント側で行う。
const INDEX_HTML: &str = include_str!("../resources/index.html");

/// GET /
pub(crate) async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}
