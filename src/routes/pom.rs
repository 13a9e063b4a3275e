use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};

use super::AppState;
use crate::error::GatewayResult;
use crate::github::GithubClient;
use crate::request::{DependencyRequest, decode_path};

/// Everything the usage page shows about one dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PomInfo {
    pub category: String,
    pub dependency_path: String,
    pub latest: String,
    pub group_id: String,
    pub artifact_id: String,
    /// Scala binary version taken from an `_2.xx` artifact suffix, or `<none>`
    pub scala_version: String,
    pub sbt_dependency: String,
    pub pom_url: String,
    pub javadoc_url: String,
    pub shield_url: String,
}

impl PomInfo {
    pub fn new(
        github: &GithubClient,
        dependency: &DependencyRequest,
        latest: &str,
        host: &str,
    ) -> Self {
        let category = &dependency.category;
        let dependency_path = dependency.dependency_path();
        let group_id = dependency.group_id();
        let artifact_id = dependency.artifact.clone();

        let (scala_version, sbt_artifact) = match artifact_id.split_once('_') {
            Some((base, scala)) => (scala.to_string(), format!(" %% \"{base}\"")),
            None => ("<none>".to_string(), format!(" % \"{artifact_id}\"")),
        };

        Self {
            sbt_dependency: format!("\"{group_id}\"{sbt_artifact} % \"{latest}\""),
            pom_url: github.raw_url(&format!(
                "{category}/{dependency_path}/{latest}/{artifact_id}-{latest}.pom"
            )),
            javadoc_url: format!(
                "//{host}/{}/javadoc/{category}/{dependency_path}/{latest}!/index.html",
                github.repository()
            ),
            shield_url: github.shield_url(category, latest, "svg"),
            category: category.clone(),
            dependency_path,
            latest: latest.to_string(),
            group_id,
            artifact_id,
            scala_version,
        }
    }
}

/// `GET /{repo}/pom/{category}/{group...}/{artifact}`
#[tracing::instrument(name = "pom", skip_all, fields(path = %uri.path()))]
pub(super) async fn handle(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> GatewayResult<Response> {
    let path = decode_path(uri.path())?;
    let dependency = DependencyRequest::parse(&path)?;
    let latest = state
        .latest_version(&dependency.category, &dependency.dependency_path())
        .await?;

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let info = PomInfo::new(&state.github, &dependency, &latest, host);

    tracing::info!(%latest, "usage page rendered");
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, mime::TEXT_HTML_UTF_8.as_ref())],
        render_pom_page(&info),
    )
        .into_response())
}

/// Render the usage page for `info`
pub fn render_pom_page(info: &PomInfo) -> String {
    let title = format!("{}:{}", info.group_id, info.artifact_id);
    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <title>{title}</title>
  </head>
  <body>
    <h1>{title} <img src="{shield}" alt="{latest}"></h1>
    <dl>
      <dt>Category</dt><dd>{category}</dd>
      <dt>Latest version</dt><dd>{latest}</dd>
      <dt>Scala version</dt><dd>{scala}</dd>
    </dl>
    <h2>SBT</h2>
    <pre>libraryDependencies += {sbt}</pre>
    <h2>Maven</h2>
    <pre>&lt;dependency&gt;
  &lt;groupId&gt;{group}&lt;/groupId&gt;
  &lt;artifactId&gt;{artifact}&lt;/artifactId&gt;
  &lt;version&gt;{latest}&lt;/version&gt;
&lt;/dependency&gt;</pre>
    <ul>
      <li><a href="{pom}">POM</a></li>
      <li><a href="{javadoc}">Javadoc</a></li>
    </ul>
  </body>
</html>
"#,
        title = escape_html(&title),
        shield = escape_html(&info.shield_url),
        latest = escape_html(&info.latest),
        category = escape_html(&capitalize(&info.category)),
        scala = escape_html(&info.scala_version),
        sbt = escape_html(&info.sbt_dependency),
        group = escape_html(&info.group_id),
        artifact = escape_html(&info.artifact_id),
        pom = escape_html(&info.pom_url),
        javadoc = escape_html(&info.javadoc_url),
    )
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn github() -> GithubClient {
        GithubClient::new(&Config::new("zengularity", "entrepot")).unwrap()
    }

    fn dependency(artifact: &str) -> DependencyRequest {
        DependencyRequest {
            category: "releases".to_string(),
            group: vec!["org".to_string(), "example".to_string()],
            artifact: artifact.to_string(),
        }
    }

    #[test]
    fn scala_artifacts_use_the_double_percent_form() {
        let info = PomInfo::new(&github(), &dependency("lib_2.12"), "1.2.0", "gw.example.com");

        assert_eq!(info.scala_version, "2.12");
        assert_eq!(info.sbt_dependency, r#""org.example" %% "lib" % "1.2.0""#);
        assert_eq!(
            info.pom_url,
            "https://raw.githubusercontent.com/zengularity/entrepot/master/releases/org/example/lib_2.12/1.2.0/lib_2.12-1.2.0.pom"
        );
        assert_eq!(
            info.javadoc_url,
            "//gw.example.com/entrepot/javadoc/releases/org/example/lib_2.12/1.2.0!/index.html"
        );
        assert_eq!(
            info.shield_url,
            "https://img.shields.io/badge/entrepot-1.2.0-green.svg"
        );
    }

    #[test]
    fn java_artifacts_use_the_single_percent_form() {
        let info = PomInfo::new(&github(), &dependency("lib"), "3.0", "localhost");

        assert_eq!(info.scala_version, "<none>");
        assert_eq!(info.sbt_dependency, r#""org.example" % "lib" % "3.0""#);
    }

    #[test]
    fn page_escapes_values() {
        let mut info = PomInfo::new(&github(), &dependency("lib_2.12"), "1.2.0", "localhost");
        info.latest = "<script>".to_string();

        let page = render_pom_page(&info);
        assert!(page.contains("&lt;script&gt;"));
        assert!(!page.contains("<script>"));
        assert!(page.contains("&quot;org.example&quot; %% &quot;lib&quot;"));
        assert!(page.contains("<dd>Releases</dd>"));
    }
}
