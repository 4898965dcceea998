use crate::ranking::Ranking;
use handlebars::{Handlebars, RenderError, TemplateError, handlebars_helper};
use serde::Serialize;

handlebars_helper!(fmt_hours: |f: f64| format!("{:.2}", f));
// 1 based rank from 0 based index
handlebars_helper!(inc: |i: u64| i + 1);

/// The pages the dashboard renders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Page {
    Index,
    Leaderboard,
    Tasks,
    Error,
}

impl Page {
    pub fn name(self) -> &'static str {
        match self {
            Page::Index => "index",
            Page::Leaderboard => "leaderboard",
            Page::Tasks => "tasks",
            Page::Error => "error",
        }
    }

    fn source(self) -> &'static str {
        match self {
            Page::Index => include_str!("./static/views/index.hbs"),
            Page::Leaderboard => include_str!("./static/views/leaderboard.hbs"),
            Page::Tasks => include_str!("./static/views/tasks.hbs"),
            Page::Error => include_str!("./static/views/error.hbs"),
        }
    }
}

const PAGES: [Page; 4] = [Page::Index, Page::Leaderboard, Page::Tasks, Page::Error];

#[derive(Serialize)]
pub struct IndexPage {
    pub title: String,
    pub team: String,
    pub team_name: String,
    pub date: String,
    pub players: Vec<String>,
    pub tasks: Vec<String>,
    pub durations: Vec<&'static str>,
}

#[derive(Serialize)]
pub struct LeaderboardPage {
    pub title: String,
    pub team: String,
    pub leaderboard_rows: usize,
    pub leaderboards: Vec<Ranking>,
}

#[derive(Serialize)]
pub struct TasksPage {
    pub title: String,
    pub team: String,
    pub tasks: Vec<Ranking>,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Serialize)]
pub struct ErrorPage {
    pub title: String,
    pub team: String,
    pub error_code: u16,
    pub error_desc: String,
}

/// Compiled page templates, shared by every request.
pub struct Views {
    templates: Handlebars<'static>,
}

impl Views {
    pub fn new() -> Result<Self, TemplateError> {
        let mut templates = Handlebars::new();
        templates.register_helper("fmt", Box::new(fmt_hours));
        templates.register_helper("inc", Box::new(inc));
        templates.register_partial("layout", include_str!("./static/views/layout.hbs"))?;
        for page in PAGES {
            templates.register_template_string(page.name(), page.source())?;
        }
        Ok(Views { templates })
    }

    pub fn render<T: Serialize>(&self, page: Page, data: &T) -> Result<String, RenderError> {
        self.templates.render(page.name(), data)
    }
}

/// Page title used by every team page.
pub fn page_title(section: &str, team_name: &str) -> String {
    format!("{} | {} UltiTracker", section, team_name)
}
