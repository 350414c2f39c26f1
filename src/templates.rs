//! Handlebars templates for the router and planner prompts

use crate::artifact::{DayPlan, TravelInfo};
use crate::error::PlannerError;
use crate::services::{Place, WebHit};
use handlebars::Handlebars;
use serde::Serialize;
use std::sync::Arc;

const ROUTER_TEMPLATE: &str = include_str!("templates/router.hbs");
const PLANNER_TEMPLATE: &str = include_str!("templates/planner.hbs");

/// Holds the handlebars templates
pub struct Templates {
    handlebars: Handlebars<'static>,
}

impl Templates {
    pub fn new() -> Result<Arc<Self>, PlannerError> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_escape_fn(handlebars::no_escape);
        for (name, source) in [("router.hbs", ROUTER_TEMPLATE), ("planner.hbs", PLANNER_TEMPLATE)] {
            handlebars
                .register_template_string(name, source)
                .map_err(|e| PlannerError::Template(e.to_string()))?;
        }

        Ok(Arc::new(Self { handlebars }))
    }

    /// Render a template by name with the given data
    pub fn render<T: Serialize>(&self, template_name: &str, data: &T) -> Result<String, PlannerError> {
        self.handlebars
            .render(template_name, data)
            .map_err(|e| PlannerError::Template(e.to_string()))
    }
}

#[derive(Serialize, Clone, Debug)]
pub struct WorkerLine {
    pub id: String,
    pub description: String,
    pub tools: Vec<String>,
}

/// Data for the router system prompt
#[derive(Serialize, Debug)]
pub struct RouterPrompt {
    pub workers: Vec<WorkerLine>,
    /// One line per known fact about the conversation
    pub facts: Vec<String>,
    pub skip_search: bool,
}

impl RouterPrompt {
    pub fn render(&self, templates: &Templates) -> Result<String, PlannerError> {
        templates.render("router.hbs", self)
    }
}

/// Data for the planner prose prompt
#[derive(Serialize, Debug)]
pub struct PlannerPrompt<'a> {
    pub info: &'a TravelInfo,
    pub days: &'a [DayPlan],
    pub hits: &'a [WebHit],
    pub places: &'a [Place],
}

impl PlannerPrompt<'_> {
    pub fn render(&self, templates: &Templates) -> Result<String, PlannerError> {
        templates.render("planner.hbs", self)
    }
}
