//! Chart data preparation for the admin and student dashboards.
//!
//! Only the shaping lives here: ranking, truncation and the
//! loading/error/empty/populated state. Drawing is the frontend's job.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::db::models::{BancaCount, SubjectCount};

pub const ELLIPSIS: &str = "...";

/// A record that can be ranked on a chart.
pub trait Counted {
    fn label(&self) -> &str;
    fn count(&self) -> u64;
}

impl Counted for SubjectCount {
    fn label(&self) -> &str {
        &self.name
    }

    fn count(&self) -> u64 {
        self.question_count
    }
}

impl Counted for BancaCount {
    fn label(&self) -> &str {
        &self.banca_nome
    }

    fn count(&self) -> u64 {
        self.quantidade
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartPoint {
    pub label: String,
    pub full_label: String,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartSpec {
    pub title: &'static str,
    pub max_items: usize,
    pub label_threshold: Option<usize>,
}

pub const BANCA_DONUT: ChartSpec = ChartSpec {
    title: "Questions by exam board",
    max_items: 10,
    label_threshold: None,
};

pub const SUBJECT_BAR: ChartSpec = ChartSpec {
    title: "Questions by subject",
    max_items: 20,
    label_threshold: None,
};

/// Cumulative question totals; `max_items` is the number of days kept.
pub const QUESTION_EVOLUTION: ChartSpec = ChartSpec {
    title: "Question evolution",
    max_items: 60,
    label_threshold: None,
};

pub const TOPIC_PERFORMANCE: ChartSpec = ChartSpec {
    title: "Performance by topic",
    max_items: 8,
    label_threshold: Some(15),
};

/// Cut `label` to `threshold` characters and mark the cut.
pub fn truncate_label(label: &str, threshold: usize) -> String {
    if label.chars().count() <= threshold {
        return label.to_string();
    }
    let mut short: String = label.chars().take(threshold).collect();
    short.push_str(ELLIPSIS);
    short
}

/// Highest counts first, at most `max_items`, long labels shortened.
/// Ties keep their input order.
pub fn top_n<T: Counted>(records: &[T], max_items: usize, label_threshold: Option<usize>) -> Vec<ChartPoint> {
    let mut ranked: Vec<&T> = records.iter().collect();
    ranked.sort_by(|a, b| b.count().cmp(&a.count()));
    ranked
        .into_iter()
        .take(max_items)
        .map(|r| ChartPoint {
            label: match label_threshold {
                Some(threshold) => truncate_label(r.label(), threshold),
                None => r.label().to_string(),
            },
            full_label: r.label().to_string(),
            count: r.count(),
        })
        .collect()
}

/// Fetch state as the dashboard hooks expose it.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub loading: bool,
    pub error: Option<String>,
    pub data: Option<Vec<T>>,
}

impl<T> QueryState<T> {
    pub fn loading() -> Self {
        Self {
            loading: true,
            error: None,
            data: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            loading: false,
            error: Some(message.into()),
            data: None,
        }
    }

    pub fn ready(data: Vec<T>) -> Self {
        Self {
            loading: false,
            error: None,
            data: Some(data),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartView<P = ChartPoint> {
    Loading,
    Error(String),
    Empty,
    Populated(Vec<P>),
}

/// Loading beats error beats empty.
fn resolve<T, P>(query: &QueryState<T>, shape: impl FnOnce(&[T]) -> Vec<P>) -> ChartView<P> {
    if query.loading {
        return ChartView::Loading;
    }
    if let Some(message) = &query.error {
        return ChartView::Error(message.clone());
    }
    match query.data.as_deref() {
        Some(records) if !records.is_empty() => ChartView::Populated(shape(records)),
        _ => ChartView::Empty,
    }
}

impl ChartView<ChartPoint> {
    /// Ranked view for the count charts.
    pub fn from_query<T: Counted>(spec: &ChartSpec, query: &QueryState<T>) -> Self {
        resolve(query, |records| top_n(records, spec.max_items, spec.label_threshold))
    }
}

impl ChartView<EvolutionPoint> {
    /// Series are plotted in date order as delivered.
    pub fn from_series(query: &QueryState<EvolutionPoint>) -> Self {
        resolve(query, |points| points.to_vec())
    }
}

impl ChartView<TopicBar> {
    pub fn from_topics(spec: &ChartSpec, query: &QueryState<TopicPerformance>) -> Self {
        resolve(query, |topics| topic_bars(topics, spec))
    }
}

/// One day on the question evolution line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvolutionPoint {
    pub day: NaiveDate,
    /// `dd/mm`, as shown on the x axis.
    pub label: String,
    /// Active questions created up to and including `day`.
    pub total: u64,
}

/// Group creation times by UTC day and accumulate, keeping the last
/// `window` days. Days cut from the front still count towards the totals.
pub fn question_evolution(created: &[DateTime<Utc>], window: usize) -> Vec<EvolutionPoint> {
    let mut per_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for ts in created {
        *per_day.entry(ts.date_naive()).or_default() += 1;
    }

    let skip = per_day.len().saturating_sub(window);
    let mut total: u64 = per_day.values().take(skip).sum();
    per_day
        .into_iter()
        .skip(skip)
        .map(|(day, count)| {
            total += count;
            EvolutionPoint {
                day,
                label: day.format("%d/%m").to_string(),
                total,
            }
        })
        .collect()
}

/// Student score against the average on one topic.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicPerformance {
    pub topic: String,
    pub student_score: f64,
    pub average_score: f64,
}

impl TopicPerformance {
    pub fn difference(&self) -> f64 {
        self.student_score - self.average_score
    }
}

/// Bar of the topic performance chart.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicBar {
    pub label: String,
    pub topic: String,
    pub student_score: f64,
    pub average_score: f64,
}

/// First `max_items` topics in the order given; labels shortened past the chart's
/// label threshold. Topics are not re-ranked.
pub fn topic_bars(topics: &[TopicPerformance], spec: &ChartSpec) -> Vec<TopicBar> {
    topics
        .iter()
        .take(spec.max_items)
        .map(|t| TopicBar {
            label: match spec.label_threshold {
                Some(threshold) => truncate_label(&t.topic, threshold),
                None => t.topic.clone(),
            },
            topic: t.topic.clone(),
            student_score: t.student_score,
            average_score: t.average_score,
        })
        .collect()
}

/// The `n` topics furthest above and furthest below the average.
pub fn best_and_worst(topics: &[TopicPerformance], n: usize) -> (Vec<TopicPerformance>, Vec<TopicPerformance>) {
    let mut sorted = topics.to_vec();
    sorted.sort_by(|a, b| b.difference().total_cmp(&a.difference()));
    let best = sorted.iter().take(n).cloned().collect();
    let worst = sorted.iter().rev().take(n).cloned().collect();
    (best, worst)
}
