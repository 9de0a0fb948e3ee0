//! Pure projection of grouped repo views into an HTML document.
//!
//! The renderer never touches the provider or the aggregator; it takes
//! already-ordered groups plus a mode and produces markup. Sort-column
//! headers carry `data-sort-key` attributes so the hosting page can dispatch
//! sort changes back to the query layer; nothing here mutates state.
use chrono::{DateTime, Utc};

use crate::aggregate::RepoView;
use crate::model::{Conclusion, RunSummary};
use crate::query::{is_package_repo, SortDir, SortKey, ViewGroup, ViewQuery};

/// Closed set of render strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    Cards,
    #[default]
    Table,
    Compact,
}

impl RenderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderMode::Cards => "cards",
            RenderMode::Table => "table",
            RenderMode::Compact => "compact",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cards" => Some(RenderMode::Cards),
            "table" => Some(RenderMode::Table),
            "compact" => Some(RenderMode::Compact),
            _ => None,
        }
    }
}

/// Everything the projection helpers need beyond the views themselves.
pub struct RenderContext<'a> {
    /// Reference instant for relative-time labels.
    pub now: DateTime<Utc>,
    pub pages_base: &'a str,
    pub package_suffix: &'a str,
    /// Active query, reflected in table headers and the control bar.
    pub query: &'a ViewQuery,
}

impl RenderContext<'_> {
    fn pages_url(&self, repo_name: &str) -> String {
        format!("{}{}/", self.pages_base, repo_name)
    }

    fn is_package(&self, repo_name: &str) -> bool {
        is_package_repo(repo_name, self.package_suffix)
    }
}

/// Relative-time label: largest applicable unit, floor division, pluralized.
/// Anything under a minute is "just now".
pub fn time_ago(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - ts).num_seconds();
    const INTERVALS: [(i64, &str); 5] = [
        (31_536_000, "year"),
        (2_592_000, "month"),
        (86_400, "day"),
        (3_600, "hour"),
        (60, "minute"),
    ];
    for (secs, label) in INTERVALS {
        let count = seconds / secs;
        if count >= 1 {
            let plural = if count > 1 { "s" } else { "" };
            return format!("{count} {label}{plural} ago");
        }
    }
    "just now".to_string()
}

/// CSS class fragment for a conclusion; absent means the run is still going
/// or the outcome was never reported.
pub fn status_class(conclusion: Option<Conclusion>) -> &'static str {
    match conclusion {
        Some(c) => c.as_str(),
        None => "unknown",
    }
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn html_attr(s: &str) -> String {
    html_escape(s).replace('"', "&quot;")
}

fn status_dot_html(conclusion: Option<Conclusion>) -> String {
    format!(
        "<span class=\"status-dot status-{}\"></span>",
        status_class(conclusion)
    )
}

/// A run history as a row of markers: a stacked proportional bar when the run
/// carries a job breakdown, a plain colored bar otherwise. The newest run is
/// visually distinguished.
fn timeline_html(runs: &[RunSummary], _ctx: &RenderContext) -> String {
    if runs.is_empty() {
        return String::new();
    }
    let mut out = String::from("<span class=\"status-timeline\">");
    for (i, run) in runs.iter().enumerate() {
        let latest_cls = if i == runs.len() - 1 {
            " status-bar-latest"
        } else {
            ""
        };
        let date = run.created_at.format("%Y-%m-%d");

        if let Some(jobs) = run.detail.jobs().filter(|j| j.total > 0) {
            let pass_pct = jobs.passed as f64 / jobs.total as f64 * 100.0;
            let fail_pct = jobs.failed as f64 / jobs.total as f64 * 100.0;
            let other_pct = 100.0 - pass_pct - fail_pct;
            let title = format!("{}/{} passed - {}", jobs.passed, jobs.total, date);
            let mut segments = String::new();
            if fail_pct > 0.0 {
                segments.push_str(&format!(
                    "<span class=\"bar-segment bar-fail\" style=\"height:{fail_pct:.0}%\"></span>"
                ));
            }
            if other_pct > 0.0 {
                segments.push_str(&format!(
                    "<span class=\"bar-segment bar-other\" style=\"height:{other_pct:.0}%\"></span>"
                ));
            }
            if pass_pct > 0.0 {
                segments.push_str(&format!(
                    "<span class=\"bar-segment bar-pass\" style=\"height:{pass_pct:.0}%\"></span>"
                ));
            }
            out.push_str(&format!(
                "<a href=\"{}\" class=\"status-bar status-bar-stacked{}\" title=\"{}\">{}</a>",
                html_attr(&run.html_url),
                latest_cls,
                html_attr(&title),
                segments
            ));
        } else {
            let title = format!(
                "{} - {}",
                run.conclusion.map(|c| c.as_str()).unwrap_or("running"),
                date
            );
            out.push_str(&format!(
                "<a href=\"{}\" class=\"status-bar status-{}{}\" title=\"{}\"></a>",
                html_attr(&run.html_url),
                status_class(run.conclusion),
                latest_cls,
                html_attr(&title)
            ));
        }
    }
    out.push_str("</span>");
    out
}

fn pending_html(view: &RepoView) -> String {
    match &view.pending {
        Some(p) => format!(
            "<a href=\"{}\" class=\"pending-badge\">{} pending</a>",
            html_attr(&p.html_url),
            html_escape(&p.version)
        ),
        None => String::new(),
    }
}

fn release_html(view: &RepoView) -> String {
    let mut parts = Vec::new();
    if let Some(rel) = &view.release {
        parts.push(format!(
            "<a href=\"{}\" class=\"release-badge\">{}</a>",
            html_attr(&rel.html_url),
            html_escape(&rel.tag)
        ));
    }
    let pending = pending_html(view);
    if !pending.is_empty() {
        parts.push(pending);
    }
    parts.join(" ")
}

fn release_table_html(view: &RepoView, ctx: &RenderContext) -> String {
    let mut parts = Vec::new();
    if let Some(rel) = &view.release {
        let age = match rel.published_at {
            Some(ts) => format!(
                "<span class=\"meta\"> {}</span>",
                time_ago(ts, ctx.now)
            ),
            None => String::new(),
        };
        parts.push(format!(
            "<a href=\"{}\" class=\"release-badge\">{}</a>{}",
            html_attr(&rel.html_url),
            html_escape(&rel.tag),
            age
        ));
    }
    let pending = pending_html(view);
    if !pending.is_empty() {
        parts.push(pending);
    }
    if parts.is_empty() {
        return "<span class=\"text-muted\">-</span>".to_string();
    }
    parts.join(" ")
}

fn coverage_html(view: &RepoView, ctx: &RenderContext) -> String {
    if !ctx.is_package(&view.repo.name) || !view.repo.has_pages {
        return String::new();
    }
    let url = format!("{}dev/coverage.html", ctx.pages_url(&view.repo.name));
    match view.coverage {
        Some(pct) => format!(
            "<a href=\"{}\" class=\"coverage-link\">{pct}%</a>",
            html_attr(&url)
        ),
        None => format!(
            "<a href=\"{}\" class=\"coverage-link\">Coverage</a>",
            html_attr(&url)
        ),
    }
}

fn issues_html(view: &RepoView) -> String {
    let (open, closed) = match view.issues {
        Some(c) => (c.open, c.closed),
        None => (0, 0),
    };
    if open == 0 && closed == 0 {
        return String::new();
    }
    let url = format!("{}/issues", view.repo.html_url);
    format!(
        "<span class=\"issues-group\"><a href=\"{0}?q=is%3Aissue+is%3Aopen\" class=\"issues-open\">{open} open</a> / <a href=\"{0}?q=is%3Aissue+is%3Aclosed\" class=\"issues-closed\">{closed} closed</a></span>",
        html_attr(&url)
    )
}

fn issues_table_html(view: &RepoView) -> String {
    let (open, closed) = match view.issues {
        Some(c) => (c.open, c.closed),
        None => (0, 0),
    };
    let url = format!("{}/issues", view.repo.html_url);
    format!(
        "<a href=\"{0}?q=is%3Aissue+is%3Aopen\" class=\"issues-open\">{open}</a> / <a href=\"{0}?q=is%3Aissue+is%3Aclosed\" class=\"issues-closed\">{closed}</a>",
        html_attr(&url)
    )
}

fn prs_table_html(view: &RepoView) -> String {
    let open = view.prs.map(|c| c.open).unwrap_or(0);
    let url = format!("{}/pulls", view.repo.html_url);
    format!(
        "<a href=\"{}\" class=\"prs-open\">{open}</a>",
        html_attr(&url)
    )
}

fn traffic_html(view: &RepoView) -> String {
    match view.traffic {
        Some(t) => format!(
            "<span class=\"meta traffic\">{} views / {} unique</span>",
            t.views, t.uniques
        ),
        None => String::new(),
    }
}

fn card_html(view: &RepoView, ctx: &RenderContext) -> String {
    let repo = &view.repo;
    let ci = view.ci_timeline();
    let docs = view.docs_timeline();

    let mut status = String::new();
    if let Some(tl) = ci {
        status.push_str(&format!(
            "<span class=\"status-item\"><span>CI</span> {}</span>",
            timeline_html(&tl.runs, ctx)
        ));
    } else if view.workflows.is_some() {
        status.push_str(&format!(
            "<span class=\"status-item\">{} <span>CI</span></span>",
            status_dot_html(None)
        ));
    }
    if ctx.is_package(&repo.name) {
        if let Some(tl) = docs {
            status.push_str(&format!(
                "<span class=\"status-item\"><span>Docs</span> {}</span>",
                timeline_html(&tl.runs, ctx)
            ));
        }
        if repo.has_pages {
            status.push_str(&format!(
                "<a href=\"{}\" class=\"docs-link\">Docs Site</a>",
                html_attr(&ctx.pages_url(&repo.name))
            ));
        }
        status.push_str(&coverage_html(view, ctx));
    }

    let desc = match &repo.description {
        Some(d) => format!("<p class=\"repo-desc\">{}</p>", html_escape(d)),
        None => String::new(),
    };

    format!(
        "<div class=\"repo-card\" data-status=\"{status_cls}\" data-language=\"{lang}\">\
<div class=\"card-header\"><a href=\"{url}\" class=\"repo-name\">{name}</a></div>\
{desc}\
<div class=\"status-row\">{status}</div>\
<div class=\"card-footer\">{release} <span class=\"meta\">pushed {pushed}</span>{issues}{traffic}</div>\
</div>",
        status_cls = status_class(view.ci_conclusion()),
        lang = html_attr(repo.language.as_deref().unwrap_or("")),
        url = html_attr(&repo.html_url),
        name = html_escape(&repo.name),
        release = release_html(view),
        pushed = time_ago(repo.pushed_at, ctx.now),
        issues = issues_html(view),
        traffic = traffic_html(view),
    )
}

fn sort_header_html(key: SortKey, label: &str, query: &ViewQuery) -> String {
    let (active_cls, arrow) = if query.sort_key == key {
        match query.sort_dir {
            SortDir::Asc => (" sort-active", " &#9650;"),
            SortDir::Desc => (" sort-active", " &#9660;"),
        }
    } else {
        ("", "")
    };
    format!(
        "<th><a class=\"sort-header{active_cls}\" href=\"?sort={key}\" data-sort-key=\"{key}\">{label}{arrow}</a></th>",
        key = key.as_str()
    )
}

fn table_row_html(view: &RepoView, ctx: &RenderContext) -> String {
    let repo = &view.repo;
    let ci_cell = match view.ci_timeline() {
        Some(tl) => timeline_html(&tl.runs, ctx),
        None => "<span class=\"text-muted\">-</span>".to_string(),
    };
    let docs_cell = if ctx.is_package(&repo.name) {
        match view.docs_timeline() {
            Some(tl) => timeline_html(&tl.runs, ctx),
            None => "<span class=\"text-muted\">-</span>".to_string(),
        }
    } else {
        String::new()
    };

    let mut repo_links = String::new();
    if ctx.is_package(&repo.name) {
        let mut parts = Vec::new();
        if repo.has_pages {
            parts.push(format!(
                "<a href=\"{}\" class=\"docs-link\">Docs</a>",
                html_attr(&ctx.pages_url(&repo.name))
            ));
        }
        let cov = coverage_html(view, ctx);
        if !cov.is_empty() {
            parts.push(cov);
        }
        if !parts.is_empty() {
            repo_links = format!(
                "<span class=\"repo-links\">{}</span>",
                parts.join(" &middot; ")
            );
        }
    }
    let desc = match &repo.description {
        Some(d) => format!("<span class=\"table-desc\">{}</span>", html_escape(d)),
        None => String::new(),
    };

    format!(
        "<tr data-status=\"{status_cls}\">\
<td><a href=\"{url}\" class=\"repo-name\">{name}</a>{repo_links}{desc}</td>\
<td class=\"status-cell\">{ci_cell}</td>\
<td class=\"status-cell\">{docs_cell}</td>\
<td>{release}</td>\
<td class=\"issues-cell\">{issues}</td>\
<td class=\"issues-cell\">{prs}</td>\
<td class=\"meta\">{pushed}</td>\
</tr>",
        status_cls = status_class(view.ci_conclusion()),
        url = html_attr(&repo.html_url),
        name = html_escape(&repo.name),
        release = release_table_html(view, ctx),
        issues = issues_table_html(view),
        prs = prs_table_html(view),
        pushed = time_ago(repo.pushed_at, ctx.now),
    )
}

fn table_html(views: &[RepoView], ctx: &RenderContext) -> String {
    let mut out = String::from("<table class=\"repo-table\"><thead><tr>");
    out.push_str(&sort_header_html(SortKey::Name, "Repository", ctx.query));
    out.push_str(&sort_header_html(SortKey::Status, "CI", ctx.query));
    out.push_str(&sort_header_html(SortKey::Docs, "Docs", ctx.query));
    out.push_str(&sort_header_html(SortKey::Release, "Release", ctx.query));
    out.push_str(&sort_header_html(SortKey::Issues, "Issues", ctx.query));
    out.push_str(&sort_header_html(SortKey::Prs, "PRs", ctx.query));
    out.push_str(&sort_header_html(SortKey::Pushed, "Last Pushed", ctx.query));
    out.push_str("</tr></thead><tbody>");
    for view in views {
        out.push_str(&table_row_html(view, ctx));
    }
    out.push_str("</tbody></table>");
    out
}

fn compact_row_html(view: &RepoView, ctx: &RenderContext) -> String {
    let repo = &view.repo;
    let status = match view.ci_timeline() {
        Some(tl) => timeline_html(&tl.runs, ctx),
        None => status_dot_html(None),
    };
    let mut extras = String::new();
    if ctx.is_package(&repo.name) {
        if let Some(tl) = view.docs_timeline() {
            extras.push_str(&format!(
                "<span class=\"compact-docs\">{} Docs</span>",
                timeline_html(&tl.runs, ctx)
            ));
        }
        if repo.has_pages {
            extras.push_str(&format!(
                "<a href=\"{}\" class=\"compact-link\">Docs Site</a>",
                html_attr(&ctx.pages_url(&repo.name))
            ));
        }
        extras.push_str(&coverage_html(view, ctx));
    }
    format!(
        "<div class=\"compact-row\" data-status=\"{status_cls}\">\
<span class=\"compact-status\">{status}</span>\
<a href=\"{url}\" class=\"compact-name\">{name}</a>\
{extras}{release}{issues}\
<span class=\"compact-pushed\">{pushed}</span>\
</div>",
        status_cls = status_class(view.ci_conclusion()),
        url = html_attr(&repo.html_url),
        name = html_escape(&repo.name),
        release = release_html(view),
        issues = issues_html(view),
        pushed = time_ago(repo.pushed_at, ctx.now),
    )
}

fn section_html(group: &ViewGroup, mode: RenderMode, ctx: &RenderContext) -> String {
    if group.views.is_empty() {
        return String::new();
    }
    let body = match mode {
        RenderMode::Cards => group
            .views
            .iter()
            .map(|v| card_html(v, ctx))
            .collect::<Vec<_>>()
            .join("\n"),
        RenderMode::Table => table_html(&group.views, ctx),
        RenderMode::Compact => {
            let rows = group
                .views
                .iter()
                .map(|v| compact_row_html(v, ctx))
                .collect::<Vec<_>>()
                .join("\n");
            format!("<div class=\"compact-list\">{rows}</div>")
        }
    };
    format!(
        "<h2 class=\"section-heading\">{}</h2>\n<div class=\"view-{}\">{}</div>\n",
        html_escape(group.label),
        mode.as_str(),
        body
    )
}

/// Project the grouped views into a dashboard fragment. An entirely empty
/// result renders a single placeholder instead of two empty section headers.
pub fn render_dashboard(groups: &[ViewGroup], mode: RenderMode, ctx: &RenderContext) -> String {
    if groups.iter().all(|g| g.views.is_empty()) {
        return "<div class=\"loading\">No repositories match the current filters.</div>"
            .to_string();
    }
    groups
        .iter()
        .map(|g| section_html(g, mode, ctx))
        .collect::<Vec<_>>()
        .join("")
}

/// Fragment shown when the fetch itself produced no repositories.
pub fn no_repos_fragment() -> String {
    "<div class=\"error\"><p>No repositories found.</p></div>".to_string()
}

/// Fragment shown when the whole batch fetch failed.
pub fn error_fragment(message: &str) -> String {
    format!(
        "<div class=\"error\"><p>Error: {}</p></div>",
        html_escape(message)
    )
}

fn select_html(id: &str, empty_label: &str, options: &[String], selected: Option<&str>) -> String {
    let mut out = format!("<select id=\"{id}\"><option value=\"\">{empty_label}</option>");
    for opt in options {
        let sel = if selected == Some(opt.as_str()) {
            " selected"
        } else {
            ""
        };
        out.push_str(&format!(
            "<option value=\"{}\"{sel}>{}</option>",
            html_attr(opt),
            html_escape(opt)
        ));
    }
    out.push_str("</select>");
    out
}

/// Full page shell: header, controls reflecting the active query, the
/// dashboard fragment, and a freshness label. `languages` feeds the language
/// filter dropdown and is usually collected from the unfiltered view set.
pub fn render_page(
    inner: &str,
    languages: &[String],
    mode: RenderMode,
    generated_at: Option<DateTime<Utc>>,
    ctx: &RenderContext,
) -> String {
    let query = ctx.query;
    let last_updated = match generated_at {
        Some(ts) => format!("Last updated: {}", time_ago(ts, ctx.now)),
        None => String::new(),
    };

    let language_select = select_html(
        "filter-language",
        "All languages",
        languages,
        query.filters.language.as_deref(),
    );
    let visibility_select = select_html(
        "filter-visibility",
        "All visibilities",
        &["public".to_string(), "private".to_string()],
        query.filters.visibility.as_deref(),
    );
    let released_select = select_html(
        "filter-released",
        "Released?",
        &["yes".to_string(), "no".to_string()],
        match query.filters.released.as_str() {
            "" => None,
            s => Some(s),
        },
    );
    let sort_select = {
        let keys = [
            SortKey::Pushed,
            SortKey::Name,
            SortKey::Status,
            SortKey::Docs,
            SortKey::Release,
            SortKey::Issues,
            SortKey::Prs,
        ];
        let mut out = String::from("<select id=\"sort-by\">");
        for key in keys {
            let sel = if query.sort_key == key { " selected" } else { "" };
            out.push_str(&format!(
                "<option value=\"{0}\"{sel}>{0}</option>",
                key.as_str()
            ));
        }
        out.push_str("</select>");
        out
    };

    let view_buttons = [RenderMode::Cards, RenderMode::Table, RenderMode::Compact]
        .iter()
        .map(|m| {
            let active = if *m == mode { " active" } else { "" };
            format!(
                "<button class=\"view-btn{active}\" data-view=\"{0}\">{0}</button>",
                m.as_str()
            )
        })
        .collect::<Vec<_>>()
        .join("");

    format!(
        r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Repository Status</title>
    <link rel="stylesheet" href="static/style.css">
  </head>
  <body>
    <header>
      <h1>Repository Status</h1>
      <span id="last-refreshed" class="meta">{last_updated}</span>
      <div class="controls">
        {language_select}
        {visibility_select}
        {released_select}
        {sort_select}
        <span class="view-toggle">{view_buttons}</span>
      </div>
    </header>
    <main id="dashboard">
      {inner}
    </main>
  </body>
</html>"#
    )
}

pub const STYLESHEET: &str = r#"
:root {
  color-scheme: light dark;
  --fg: #222;
  --bg: #fff;
  --muted: #666;
  --pass: #2da44e;
  --fail: #cf222e;
  --other: #bf8700;
  --unknown: #8c959f;
}

@media (prefers-color-scheme: dark) {
  :root {
    --fg: #eee;
    --bg: #121212;
    --muted: #aaa;
  }
}

html,
body {
  margin: 0;
  padding: 0;
  background: var(--bg);
  color: var(--fg);
  font: 14px/1.6 -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto,
        'Helvetica Neue', Arial, 'Noto Sans', sans-serif;
}

header {
  padding: 16px;
  border-bottom: 1px solid #ddd4;
}

main {
  padding: 16px;
  max-width: 1100px;
  margin: 0 auto;
}

.meta,
.text-muted {
  color: var(--muted);
}

.section-heading {
  margin: 24px 0 8px;
  font-size: 18px;
}

.view-cards {
  display: grid;
  grid-template-columns: repeat(auto-fill, minmax(320px, 1fr));
  gap: 12px;
}

.repo-card {
  border: 1px solid #ddd4;
  border-radius: 8px;
  padding: 12px;
}

.repo-name {
  font-weight: 600;
  text-decoration: none;
}

.repo-desc,
.table-desc {
  color: var(--muted);
  font-size: 13px;
}

.table-desc {
  display: block;
}

.repo-table {
  border-collapse: collapse;
  width: 100%;
}

.repo-table th,
.repo-table td {
  text-align: left;
  padding: 6px 10px;
  border-bottom: 1px solid #ddd3;
}

.sort-header {
  text-decoration: none;
  color: inherit;
}

.sort-header.sort-active {
  font-weight: 700;
}

.status-timeline {
  display: inline-flex;
  align-items: flex-end;
  gap: 2px;
  height: 16px;
}

.status-bar {
  display: inline-block;
  width: 6px;
  height: 100%;
  border-radius: 1px;
  background: var(--unknown);
}

.status-bar-latest {
  outline: 1px solid var(--fg);
}

.status-bar.status-success { background: var(--pass); }
.status-bar.status-failure { background: var(--fail); }
.status-bar.status-cancelled { background: var(--other); }
.status-bar.status-unknown { background: var(--unknown); }

.status-bar-stacked {
  display: inline-flex;
  flex-direction: column;
  justify-content: flex-end;
  background: none;
}

.bar-segment {
  display: block;
  width: 100%;
}

.bar-pass { background: var(--pass); }
.bar-fail { background: var(--fail); }
.bar-other { background: var(--other); }

.status-dot {
  display: inline-block;
  width: 8px;
  height: 8px;
  border-radius: 50%;
  background: var(--unknown);
}

.status-dot.status-success { background: var(--pass); }
.status-dot.status-failure { background: var(--fail); }

.release-badge,
.pending-badge,
.coverage-link,
.docs-link {
  display: inline-block;
  padding: 1px 6px;
  border-radius: 10px;
  font-size: 12px;
  text-decoration: none;
  border: 1px solid #ddd6;
}

.pending-badge {
  border-style: dashed;
  color: var(--other);
}

.compact-list {
  display: flex;
  flex-direction: column;
  gap: 4px;
}

.compact-row {
  display: flex;
  align-items: center;
  gap: 10px;
  padding: 4px 0;
  border-bottom: 1px dashed #ddd3;
}

.compact-pushed {
  margin-left: auto;
  color: var(--muted);
}

.view-btn {
  padding: 2px 10px;
}

.view-btn.active {
  font-weight: 700;
}

.loading,
.error {
  padding: 32px;
  text-align: center;
  color: var(--muted);
}
"#;
