//! Data-driven templates: a matcher, field rules, and task specs.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::{ExtractError, RegistryError};
use crate::extract::dates::parse_schedule;
use crate::extract::{Anchor, BodyNeed, FieldDefault, FieldRule, Fields, Source, extract_fields};
use crate::handlers::matcher::{Matcher, Test};
use crate::handlers::{Handler, HandlerInput, HandlerOutcome};
use crate::mailbox::Headers;
use crate::task::{DEFAULT_PRIORITY, Scheduled, TaskRecord};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w+)\}").expect("valid regex"));

/// Substitute `{field}` placeholders; unknown fields render empty.
pub fn render(template: &str, fields: &Fields) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| {
            fields.text(&caps[1]).unwrap_or_default().to_string()
        })
        .into_owned()
}

fn placeholders(template: &str) -> impl Iterator<Item = &str> {
    PLACEHOLDER
        .captures_iter(template)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
}

// ── Task specs ──────────────────────────────────────────────────────

/// When a task is scheduled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleSpec {
    Today,
    /// Parsed from a field (a day or a window); today when unknown or unparseable.
    Field(String),
}

/// One line of a task body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyLine {
    /// Literal text; may contain `{field}` placeholders.
    Text(String),
    /// The value of a field, verbatim.
    Field(String),
    /// Link back to the source message.
    Link,
}

/// How to build one task from extracted fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub heading: String,
    pub context: String,
    pub priority: String,
    pub scheduled: ScheduleSpec,
    pub body: Vec<BodyLine>,
}

impl TaskSpec {
    pub fn new(heading: &str, context: &str) -> Self {
        Self {
            heading: heading.to_string(),
            context: context.to_string(),
            priority: DEFAULT_PRIORITY.to_string(),
            scheduled: ScheduleSpec::Today,
            body: Vec::new(),
        }
    }

    pub fn priority(mut self, priority: &str) -> Self {
        self.priority = priority.to_string();
        self
    }

    pub fn scheduled_from(mut self, field: &str) -> Self {
        self.scheduled = ScheduleSpec::Field(field.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.body.push(BodyLine::Text(text.to_string()));
        self
    }

    pub fn field(mut self, field: &str) -> Self {
        self.body.push(BodyLine::Field(field.to_string()));
        self
    }

    pub fn link(mut self) -> Self {
        self.body.push(BodyLine::Link);
        self
    }

    fn referenced_fields(&self) -> Vec<&str> {
        let mut names: Vec<&str> = placeholders(&self.heading).collect();
        for line in &self.body {
            match line {
                BodyLine::Text(text) => names.extend(placeholders(text)),
                BodyLine::Field(name) => names.push(name),
                BodyLine::Link => {}
            }
        }
        if let ScheduleSpec::Field(ref name) = self.scheduled {
            names.push(name);
        }
        names
    }

    fn build(
        &self,
        template: &str,
        fields: &Fields,
        input: &HandlerInput<'_>,
    ) -> Result<TaskRecord, ExtractError> {
        let heading = render(&self.heading, fields);
        if heading.trim().is_empty() {
            return Err(ExtractError::EmptyHeading {
                template: template.to_string(),
            });
        }

        let scheduled = match self.scheduled {
            ScheduleSpec::Today => Scheduled::On(input.today),
            ScheduleSpec::Field(ref name) => fields
                .text(name)
                .and_then(|text| parse_schedule(text, input.today))
                .unwrap_or_else(|| {
                    debug!(template, field = %name, "No usable date, scheduling today");
                    Scheduled::On(input.today)
                }),
        };

        let body = self
            .body
            .iter()
            .map(|line| match line {
                BodyLine::Text(text) => render(text, fields),
                BodyLine::Field(name) => fields.text(name).unwrap_or_default().to_string(),
                BodyLine::Link => input.message_link(),
            })
            .map(|line| line.trim_end_matches('\n').to_string())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(TaskRecord::new(
            &heading,
            &self.context,
            &self.priority,
            scheduled,
            &body,
        ))
    }
}

// ── Template ────────────────────────────────────────────────────────

/// A registered sender template.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    matcher: Matcher,
    fields: Vec<FieldRule>,
    tasks: Vec<TaskSpec>,
}

impl Template {
    pub fn builder(name: &str) -> TemplateBuilder {
        TemplateBuilder {
            name: name.to_string(),
            matcher: Matcher::new(),
            fields: Vec::new(),
            tasks: Vec::new(),
            error: None,
        }
    }
}

impl Handler for Template {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, headers: &Headers) -> bool {
        self.matcher.matches(headers)
    }

    fn body_need(&self) -> BodyNeed {
        self.fields
            .iter()
            .map(FieldRule::body_need)
            .max()
            .unwrap_or(BodyNeed::None)
    }

    fn handle(&self, input: &HandlerInput<'_>) -> Result<HandlerOutcome, ExtractError> {
        let fields = extract_fields(&self.name, &self.fields, input.headers, input.body)?;
        let tasks = self
            .tasks
            .iter()
            .map(|spec| spec.build(&self.name, &fields, input))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(HandlerOutcome {
            fields,
            tasks,
            archive: true,
        })
    }
}

/// Builder for `Template`. Pattern errors surface from `build`.
#[derive(Debug)]
pub struct TemplateBuilder {
    name: String,
    matcher: Matcher,
    fields: Vec<FieldRule>,
    tasks: Vec<TaskSpec>,
    error: Option<RegistryError>,
}

impl TemplateBuilder {
    fn compile(&mut self, pattern: &str) -> Option<Regex> {
        match Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(source) => {
                self.error.get_or_insert(RegistryError::InvalidPattern {
                    handler: self.name.clone(),
                    source,
                });
                None
            }
        }
    }

    pub fn header(mut self, header: &str, test: Test) -> Self {
        self.matcher = self.matcher.with(header, test);
        self
    }

    pub fn subject_is(self, subject: &str) -> Self {
        self.header("Subject", Test::Equals(subject.to_string()))
    }

    pub fn subject_contains(self, needle: &str) -> Self {
        self.header("Subject", Test::Contains(needle.to_string()))
    }

    pub fn subject_matches(mut self, pattern: &str) -> Self {
        match self.compile(pattern) {
            Some(re) => self.header("Subject", Test::Matches(re)),
            None => self,
        }
    }

    pub fn from_is(self, from: &str) -> Self {
        self.header("From", Test::Equals(from.to_string()))
    }

    pub fn from_contains(self, needle: &str) -> Self {
        self.header("From", Test::Contains(needle.to_string()))
    }

    /// Add a field rule. Anchors are tried in the order given.
    pub fn field(mut self, name: &str, default: FieldDefault, anchors: &[(Source, &str)]) -> Self {
        let mut compiled = Vec::with_capacity(anchors.len());
        for (source, pattern) in anchors {
            if let Some(re) = self.compile(pattern) {
                compiled.push(Anchor {
                    source: source.clone(),
                    pattern: re,
                });
            }
        }
        self.fields.push(FieldRule {
            name: name.to_string(),
            anchors: compiled,
            default,
        });
        self
    }

    pub fn task(mut self, spec: TaskSpec) -> Self {
        self.tasks.push(spec);
        self
    }

    pub fn build(self) -> Result<Template, RegistryError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.matcher.conditions().is_empty() {
            return Err(RegistryError::Incomplete {
                handler: self.name,
                reason: "no header conditions".into(),
            });
        }
        if self.tasks.is_empty() {
            return Err(RegistryError::Incomplete {
                handler: self.name,
                reason: "no tasks".into(),
            });
        }
        for spec in &self.tasks {
            for name in spec.referenced_fields() {
                if !self.fields.iter().any(|f| f.name == name) {
                    return Err(RegistryError::UnknownField {
                        handler: self.name.clone(),
                        field: name.to_string(),
                    });
                }
            }
        }
        Ok(Template {
            name: self.name,
            matcher: self.matcher,
            fields: self.fields,
            tasks: self.tasks,
        })
    }
}
