use std::fmt;

use thiserror::Error;

use crate::{
    dates::DateRange,
    district::{find_district, District},
    intervention::Recommendation,
    metric::{MetricKind, MetricValue},
    sampler::{sample, MetricSource, SampleError},
};

/// The inputs of a single-district query, filled in any order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryForm {
    dates: Option<DateRange>,
    metric: Option<MetricKind>,
    district: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryField {
    Dates,
    Metric,
    District,
}

impl fmt::Display for QueryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueryField::Dates => "date range",
            QueryField::Metric => "metric",
            QueryField::District => "district",
        })
    }
}

/// A complete query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub dates: DateRange,
    pub metric: MetricKind,
    pub district: String,
}

impl QueryForm {
    pub fn new() -> Self { Self::default() }

    pub fn set_dates(&mut self, dates: DateRange) -> &mut Self {
        self.dates = Some(dates);
        self
    }

    pub fn set_metric(&mut self, metric: MetricKind) -> &mut Self {
        self.metric = Some(metric);
        self
    }

    /// Blank names leave the field unset.
    pub fn set_district(&mut self, name: &str) -> &mut Self {
        let name = name.trim();
        self.district = (!name.is_empty()).then(|| name.to_string());
        self
    }

    pub fn missing(&self) -> Vec<QueryField> {
        let mut fields = Vec::new();
        if self.dates.is_none() { fields.push(QueryField::Dates) }
        if self.metric.is_none() { fields.push(QueryField::Metric) }
        if self.district.is_none() { fields.push(QueryField::District) }
        fields
    }

    /// The query, once every field is filled.
    pub fn ready(&self) -> Option<Query> {
        Some(Query {
            dates: self.dates?,
            metric: self.metric?,
            district: self.district.clone()?,
        })
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("unknown district {0:?}")]
    UnknownDistrict(String),
    #[error(transparent)]
    Sample(#[from] SampleError),
}

/// The result of a query, ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryAnswer {
    pub district: String,
    pub metric: MetricKind,
    pub value: MetricValue,
    pub recommendation: Recommendation,
}

impl QueryAnswer {
    pub fn intervention(&self) -> String { self.recommendation.message(&self.district) }
}

impl fmt::Display for QueryAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}: {}", self.district, self.metric.label(), self.metric.format(self.value))?;
        write!(f, "{}", self.intervention())
    }
}

/// Compute one metric for one district.
pub fn run_query(query: &Query, districts: &[District], source: &MetricSource) -> Result<QueryAnswer, QueryError> {
    let district = find_district(districts, &query.district)
        .ok_or_else(|| QueryError::UnknownDistrict(query.district.clone()))?;
    let value = sample(query.metric, source, &district.geometry, Some(&query.dates))?;
    Ok(QueryAnswer {
        district: district.name.clone(),
        metric: query.metric,
        value,
        recommendation: Recommendation::classify(query.metric, value),
    })
}
