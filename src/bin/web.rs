use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use litho::i18n;
use litho::{matrix, Config, Lang, ModelKind, SineType};

#[derive(Deserialize)]
struct LangQuery {
    lang: Option<String>,
}

impl LangQuery {
    fn lang(&self) -> Lang {
        self.lang
            .as_deref()
            .and_then(Lang::from_code)
            .unwrap_or(Lang::Zh)
    }
}

#[derive(Deserialize)]
struct SchemaQuery {
    sine: Option<String>,
}

const INDEX_HTML: &str = r##"<!doctype html>
<html lang="zh-CN">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Photoresist Model Matrix</title>
    <link rel="preconnect" href="https://fonts.googleapis.com" />
    <link rel="preconnect" href="https://fonts.gstatic.com" crossorigin />
    <link href="https://fonts.googleapis.com/css2?family=Space+Grotesk:wght@400;500;600&display=swap" rel="stylesheet" />
    <script defer src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
    <style>
      html, body { margin: 0; padding: 0; min-height: 100%; background: #0b0c10; color: #e6e6e6; font-family: "Space Grotesk", "Segoe UI", sans-serif; }
      header { display: flex; justify-content: space-between; align-items: center; padding: 16px 24px; border-bottom: 1px solid #1f2630; }
      .brand { font-size: 18px; font-weight: 600; letter-spacing: 0.02em; }
      .subtitle { font-size: 12px; color: #9aa3ad; margin-top: 4px; }
      button { background: #11151b; color: #e6e6e6; border: 1px solid #2a2f36; border-radius: 6px; padding: 6px 10px; font-size: 12px; cursor: pointer; }
      button:hover { border-color: #3c6a9e; }
      #matrix { display: grid; grid-template-columns: 120px repeat(3, minmax(0, 1fr)); gap: 10px; padding: 24px; }
      .axis { font-size: 11px; text-transform: uppercase; letter-spacing: 0.12em; color: #9aa3ad; display: flex; align-items: center; justify-content: center; text-align: center; }
      .cell { background: rgba(10,12,16,0.9); border: 1px solid #2a2f36; border-radius: 10px; padding: 12px; cursor: pointer; min-height: 80px; }
      .cell:hover { border-color: #3c6a9e; }
      .cell-title { font-size: 14px; font-weight: 500; }
      .cell-dim { font-size: 11px; color: #7f8895; margin-top: 6px; }
      #modal { position: fixed; inset: 0; background: rgba(0,0,0,0.6); display: none; align-items: center; justify-content: center; }
      #modal.open { display: flex; }
      #detail { width: min(860px, 92vw); max-height: 86vh; overflow: auto; background: #0f1218; border: 1px solid #2a2f36; border-radius: 10px; padding: 18px; }
      .section { margin-top: 12px; padding-top: 10px; border-top: 1px solid #1f2630; }
      .section-title { font-size: 11px; text-transform: uppercase; letter-spacing: 0.12em; color: #9aa3ad; margin-bottom: 6px; }
      .formula { margin: 8px 0; }
      .note, .hint { font-size: 11px; color: #7f8895; }
      .row { display: flex; gap: 8px; justify-content: space-between; margin-top: 12px; }
      table { width: 100%; border-collapse: collapse; font-size: 12px; }
      td { border-top: 1px solid #1f2630; padding: 4px 6px; vertical-align: top; }
    </style>
  </head>
  <body>
    <header>
      <div>
        <div class="brand" data-i18n="matrix_title"></div>
        <div class="subtitle" data-i18n="matrix_subtitle"></div>
      </div>
      <button id="langButton" data-i18n="lang_btn"></button>
    </header>
    <div id="matrix"></div>
    <div id="modal">
      <div id="detail">
        <div class="row">
          <div>
            <div class="brand" id="detailTitle"></div>
            <div class="hint" id="detailDim"></div>
          </div>
          <button id="closeButton">×</button>
        </div>
        <div class="section"><div id="detailModel"></div></div>
        <div class="section">
          <div class="section-title" data-i18n="core_formulas"></div>
          <div id="detailFormulas"></div>
        </div>
        <div class="section">
          <div class="section-title" data-i18n="main_parameters"></div>
          <table id="detailParams"></table>
        </div>
        <div class="section hint"><span data-i18n="reference"></span> <span id="detailRef"></span></div>
        <div class="row">
          <button id="prevButton" data-i18n="prev_model"></button>
          <button id="nextButton" data-i18n="next_model"></button>
        </div>
      </div>
    </div>
    <script>
      const KEY = "userLanguage";
      let lang = localStorage.getItem(KEY) === "en" ? "en" : "zh";
      let cells = [];
      let current = null;

      async function load() {
        const [table, matrix] = await Promise.all([
          fetch(`/api/i18n?lang=${lang}`).then((r) => r.json()),
          fetch(`/api/matrix?lang=${lang}`).then((r) => r.json()),
        ]);
        document.documentElement.lang = lang === "zh" ? "zh-CN" : "en";
        document.querySelectorAll("[data-i18n]").forEach((el) => {
          el.textContent = table[el.dataset.i18n] ?? el.dataset.i18n;
        });
        cells = matrix;
        drawGrid();
        if (current !== null) openCell(current);
      }

      function drawGrid() {
        const grid = document.getElementById("matrix");
        grid.innerHTML = "";
        grid.appendChild(document.createElement("div"));
        cells.slice(0, 3).forEach((c) => {
          const head = document.createElement("div");
          head.className = "axis";
          head.textContent = c.dimension_title;
          grid.appendChild(head);
        });
        for (let row = 0; row < 3; row++) {
          const label = document.createElement("div");
          label.className = "axis";
          label.textContent = cells[row * 3].model_title;
          grid.appendChild(label);
          for (let col = 0; col < 3; col++) {
            const c = cells[row * 3 + col];
            const el = document.createElement("div");
            el.className = "cell";
            el.innerHTML = `<div class="cell-title"></div><div class="cell-dim"></div>`;
            el.querySelector(".cell-title").textContent = c.title;
            el.querySelector(".cell-dim").textContent = c.dimension_description;
            el.addEventListener("click", () => openCell(c.index));
            grid.appendChild(el);
          }
        }
      }

      function openCell(index) {
        current = index;
        const c = cells[index];
        document.getElementById("detailTitle").textContent = c.title;
        document.getElementById("detailDim").textContent = c.dimension_description;
        document.getElementById("detailModel").textContent = c.model_description;
        document.getElementById("detailRef").textContent = c.reference;
        const formulas = document.getElementById("detailFormulas");
        formulas.innerHTML = "";
        c.formulas.forEach((f) => {
          const block = document.createElement("div");
          block.className = "formula";
          block.innerHTML = `<div></div><div>\\[${f.formula}\\]</div>`;
          block.firstChild.textContent = f.title;
          if (f.note) {
            const note = document.createElement("div");
            note.className = "note";
            note.textContent = f.note;
            block.appendChild(note);
          }
          formulas.appendChild(block);
        });
        const params = document.getElementById("detailParams");
        params.innerHTML = "";
        c.parameters.forEach((p) => {
          const tr = params.insertRow();
          tr.insertCell().textContent = p.name;
          tr.insertCell().textContent = p.description;
        });
        document.getElementById("modal").classList.add("open");
        if (window.MathJax && MathJax.typesetPromise) MathJax.typesetPromise([formulas]);
      }

      document.getElementById("closeButton").addEventListener("click", () => {
        current = null;
        document.getElementById("modal").classList.remove("open");
      });
      document.getElementById("prevButton").addEventListener("click", () => openCell((current + cells.length - 1) % cells.length));
      document.getElementById("nextButton").addEventListener("click", () => openCell((current + 1) % cells.length));
      document.getElementById("langButton").addEventListener("click", () => {
        lang = lang === "zh" ? "en" : "zh";
        localStorage.setItem(KEY, lang);
        load();
      });
      load();
    </script>
  </body>
</html>
"##;

async fn index() -> impl IntoResponse {
    Html(INDEX_HTML)
}

async fn matrix_cells(Query(q): Query<LangQuery>) -> impl IntoResponse {
    Json(matrix::cells(q.lang()))
}

async fn matrix_cell(Path(index): Path<usize>, Query(q): Query<LangQuery>) -> Response {
    match matrix::MATRIX.get(index) {
        Some(entry) => Json(entry.localize(index, q.lang())).into_response(),
        None => (StatusCode::NOT_FOUND, format!("no matrix cell {}", index)).into_response(),
    }
}

async fn schema(Path(model): Path<String>, Query(q): Query<SchemaQuery>) -> Response {
    let Some(model) = ModelKind::from_id(&model) else {
        return (StatusCode::NOT_FOUND, format!("unknown model {}", model)).into_response();
    };
    let sine = match q.sine.as_deref() {
        None => SineType::Single,
        Some(id) => match SineType::from_id(id) {
            Some(sine) => sine,
            None => return (StatusCode::BAD_REQUEST, format!("unknown sine type {}", id)).into_response(),
        },
    };
    debug!(model = model.as_str(), sine = sine.as_str(), "schema");
    Json(model.schema(sine)).into_response()
}

async fn translations(Query(q): Query<LangQuery>) -> impl IntoResponse {
    Json(i18n::table(q.lang()))
}

fn router() -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/matrix", get(matrix_cells))
        .route("/api/matrix/:index", get(matrix_cell))
        .route("/api/schema/:model", get(schema))
        .route("/api/i18n", get(translations))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    let listener = tokio::net::TcpListener::bind(config.web_addr).await?;
    println!("Serving on http://{}", config.web_addr);
    info!(api = %config.api_base_url, "matrix page ready");
    axum::serve(listener, router()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    async fn serve() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router()).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_matrix_follows_lang() {
        let base = serve().await;
        let cells: Value = reqwest::get(format!("{}/api/matrix?lang=en", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(cells.as_array().unwrap().len(), 9);
        assert_eq!(cells[0]["model"], "dill");
        assert_eq!(cells[0]["dimension_title"], Lang::En.text("dim_1d"));

        let cell: Value = reqwest::get(format!("{}/api/matrix/8?lang=zh", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(cell["model"], "car");
        let missing = reqwest::get(format!("{}/api/matrix/9", base)).await.unwrap();
        assert_eq!(missing.status(), 404);
    }

    #[tokio::test]
    async fn test_schema_and_table() {
        let base = serve().await;
        let schema: Value = reqwest::get(format!("{}/api/schema/car?sine=multi", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let keys: Vec<_> = schema["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["key"].as_str().unwrap().to_string())
            .collect();
        assert!(keys.contains(&"acid_gen_efficiency".to_string()));
        assert!(keys.contains(&"y_points".to_string()));

        let bad = reqwest::get(format!("{}/api/schema/pinn", base)).await.unwrap();
        assert_eq!(bad.status(), 404);
        let bad = reqwest::get(format!("{}/api/schema/dill?sine=4d", base)).await.unwrap();
        assert_eq!(bad.status(), 400);

        let table: Value = reqwest::get(format!("{}/api/i18n?lang=en", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(table["calculate"], "Calculate");
    }
}
