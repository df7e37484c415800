//! Memoizing group aggregation.
//!
//! `GroupAggregator` holds a table, a grouping key and one directive: either
//! a function applied to each group, or a per-column reduction spec. The two
//! directives are mutually exclusive; setting one drops the other with a
//! warning. Results are cached and only recomputed after the table, the key
//! or the directive actually change.

use crate::error::{ClimateError, Result};
use crate::table::Table;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

// =============================================================================
// Reductions
// =============================================================================

/// Named reduction applied to one column of each group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    Min,
    Max,
    Mean,
    Median,
    Sum,
    Count,
    First,
    Last,
    Std,
}

impl Reduction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reduction::Min => "min",
            Reduction::Max => "max",
            Reduction::Mean => "mean",
            Reduction::Median => "median",
            Reduction::Sum => "sum",
            Reduction::Count => "count",
            Reduction::First => "first",
            Reduction::Last => "last",
            Reduction::Std => "std",
        }
    }

    /// Aggregation expression over `column`, keeping the column name
    pub fn expr(&self, column: &str) -> Expr {
        let input = col(column);
        let reduced = match self {
            Reduction::Min => input.min(),
            Reduction::Max => input.max(),
            Reduction::Mean => input.mean(),
            Reduction::Median => input.median(),
            Reduction::Sum => input.sum(),
            Reduction::Count => input.count(),
            Reduction::First => input.first(),
            Reduction::Last => input.last(),
            Reduction::Std => input.std(1),
        };
        reduced.alias(column)
    }
}

impl FromStr for Reduction {
    type Err = ClimateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "min" | "minimum" => Ok(Reduction::Min),
            "max" | "maximum" => Ok(Reduction::Max),
            "mean" | "avg" | "average" => Ok(Reduction::Mean),
            "median" => Ok(Reduction::Median),
            "sum" => Ok(Reduction::Sum),
            "count" => Ok(Reduction::Count),
            "first" => Ok(Reduction::First),
            "last" => Ok(Reduction::Last),
            "std" => Ok(Reduction::Std),
            _ => Err(ClimateError::InvalidReduction {
                name: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered mapping from column name to reduction, one reduction per column
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggSpec {
    entries: Vec<(String, Reduction)>,
}

impl AggSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reduction, replacing any earlier one for the same column
    pub fn with(mut self, column: impl Into<String>, reduction: Reduction) -> Self {
        let column = column.into();
        match self.entries.iter_mut().find(|(name, _)| *name == column) {
            Some(entry) => entry.1 = reduction,
            None => self.entries.push((column, reduction)),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Reduction)> {
        self.entries
            .iter()
            .map(|(column, reduction)| (column.as_str(), *reduction))
    }

    pub fn columns(&self) -> impl Iterator<Item = &String> {
        self.entries.iter().map(|(column, _)| column)
    }

    fn exprs(&self) -> Vec<Expr> {
        self.iter()
            .map(|(column, reduction)| reduction.expr(column))
            .collect()
    }
}

/// Parses `column=reduction` pairs separated by commas
impl FromStr for AggSpec {
    type Err = ClimateError;

    fn from_str(s: &str) -> Result<Self> {
        let mut spec = AggSpec::new();

        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (column, reduction) = pair.split_once('=').ok_or_else(|| {
                ClimateError::configuration(format!(
                    "Aggregation '{}' must look like column=reduction",
                    pair
                ))
            })?;
            spec = spec.with(column.trim(), reduction.parse()?);
        }

        if spec.is_empty() {
            return Err(ClimateError::configuration("Empty aggregation spec"));
        }
        Ok(spec)
    }
}

impl fmt::Display for AggSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self
            .iter()
            .map(|(column, reduction)| format!("{}={}", column, reduction))
            .collect();
        f.write_str(&pairs.join(","))
    }
}

// =============================================================================
// Apply functions
// =============================================================================

pub type GroupFn = dyn Fn(&DataFrame) -> PolarsResult<DataFrame> + Send + Sync;

/// Function applied to the sub-frame of each group.
///
/// Two `GroupApply` values are equal only when they share the same function
/// allocation; cloning keeps equality, wrapping the same closure twice does not.
#[derive(Clone)]
pub struct GroupApply {
    name: String,
    func: Arc<GroupFn>,
}

impl GroupApply {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&DataFrame) -> PolarsResult<DataFrame> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, group: &DataFrame) -> PolarsResult<DataFrame> {
        (self.func)(group)
    }
}

impl PartialEq for GroupApply {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for GroupApply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupApply")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Directive and request
// =============================================================================

/// What to do with each group
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Directive {
    #[default]
    None,
    Apply(GroupApply),
    Aggregate(AggSpec),
}

/// Raised when one directive replaces the other
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveConflict {
    /// An apply function was set while an aggregation spec was active
    ApplyReplacedAggregation,
    /// An aggregation spec was set while an apply function was active
    AggregationReplacedApply,
}

impl fmt::Display for DirectiveConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectiveConflict::ApplyReplacedAggregation => f.write_str(
                "Apply function set, but aggregation arguments were already set; removing the aggregation arguments",
            ),
            DirectiveConflict::AggregationReplacedApply => f.write_str(
                "Aggregation arguments set, but an apply function was already set; removing the apply function",
            ),
        }
    }
}

/// Optional overrides for a single `aggregate` call
#[derive(Debug, Clone, Default)]
pub struct GroupRequest {
    pub table: Option<Arc<Table>>,
    pub group_by: Option<Vec<String>>,
    pub apply: Option<GroupApply>,
    pub aggregation: Option<AggSpec>,
}

impl GroupRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: Arc<Table>) -> Self {
        self.table = Some(table);
        self
    }

    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn apply(mut self, apply: GroupApply) -> Self {
        self.apply = Some(apply);
        self
    }

    pub fn aggregate(mut self, aggregation: AggSpec) -> Self {
        self.aggregation = Some(aggregation);
        self
    }
}

// =============================================================================
// Aggregator state machine
// =============================================================================

/// Observable state of a `GroupAggregator`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrouperState {
    /// Nothing has been set
    Empty,
    /// Inputs set, nothing computed yet
    Configured,
    /// A cached result is current
    Grouped,
    /// A result was computed but its inputs have since changed
    Stale,
}

type Partitions = Arc<Vec<DataFrame>>;

#[derive(Debug, Clone)]
enum Cache {
    Empty,
    Configured,
    Stale {
        partitions: Option<Partitions>,
    },
    Grouped {
        partitions: Option<Partitions>,
        result: Arc<Table>,
    },
}

/// Caching group-by engine. Each data session owns its own instance.
#[derive(Debug)]
pub struct GroupAggregator {
    table: Option<Arc<Table>>,
    group_by: Vec<String>,
    directive: Directive,
    invalid_columns: Vec<String>,
    conflicts: Vec<DirectiveConflict>,
    cache: Cache,
}

impl Default for GroupAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupAggregator {
    pub fn new() -> Self {
        Self {
            table: None,
            group_by: Vec::new(),
            directive: Directive::None,
            invalid_columns: Vec::new(),
            conflicts: Vec::new(),
            cache: Cache::Empty,
        }
    }

    /// Create an aggregator bound to a table
    pub fn with_table(table: Arc<Table>) -> Self {
        let mut aggregator = Self::new();
        aggregator.set_table(table);
        aggregator
    }

    pub fn state(&self) -> GrouperState {
        match self.cache {
            Cache::Empty => GrouperState::Empty,
            Cache::Configured => GrouperState::Configured,
            Cache::Stale { .. } => GrouperState::Stale,
            Cache::Grouped { .. } => GrouperState::Grouped,
        }
    }

    pub fn table(&self) -> Option<&Arc<Table>> {
        self.table.as_ref()
    }

    pub fn group_by(&self) -> &[String] {
        &self.group_by
    }

    pub fn directive(&self) -> &Directive {
        &self.directive
    }

    /// Grouping columns missing from the table at the last validation
    pub fn invalid_columns(&self) -> &[String] {
        &self.invalid_columns
    }

    /// Every directive conflict raised so far, oldest first
    pub fn conflicts(&self) -> &[DirectiveConflict] {
        &self.conflicts
    }

    /// Bind a table. A table with different content discards all cached work.
    pub fn set_table(&mut self, table: Arc<Table>) {
        let unchanged = self
            .table
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &table) || current.same_content(&table));

        if unchanged {
            // Keep handing out the same Arc for equal content
            return;
        }

        debug!("Grouper table changed ({} rows)", table.height());
        self.table = Some(table);
        self.invalidate(false);
    }

    /// Set the grouping key; an empty key means no grouping
    pub fn set_group_by<I, S>(&mut self, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if self.group_by != columns {
            debug!("Grouper key changed to {:?}", columns);
            self.group_by = columns;
            self.invalidate(false);
        }
    }

    /// Set the per-group apply function, dropping any aggregation spec
    pub fn set_apply(&mut self, apply: GroupApply) -> Option<DirectiveConflict> {
        if matches!(&self.directive, Directive::Apply(current) if *current == apply) {
            return None;
        }

        let conflict = matches!(self.directive, Directive::Aggregate(_))
            .then_some(DirectiveConflict::ApplyReplacedAggregation);

        debug!("Grouper apply function set to '{}'", apply.name());
        self.directive = Directive::Apply(apply);
        self.invalidate(true);
        self.record(conflict)
    }

    /// Set the aggregation spec, dropping any apply function
    pub fn set_aggregation(&mut self, aggregation: AggSpec) -> Option<DirectiveConflict> {
        if matches!(&self.directive, Directive::Aggregate(current) if *current == aggregation) {
            return None;
        }

        let conflict = matches!(self.directive, Directive::Apply(_))
            .then_some(DirectiveConflict::AggregationReplacedApply);

        debug!("Grouper aggregation set to {}", aggregation);
        self.directive = Directive::Aggregate(aggregation);
        self.invalidate(true);
        self.record(conflict)
    }

    /// Apply any overrides, validate, then return the grouped table.
    ///
    /// Repeated calls with unchanged inputs return the cached `Arc` without
    /// recomputing. An empty grouping key returns the input table as is.
    pub fn aggregate(&mut self, request: GroupRequest) -> Result<Arc<Table>> {
        if let Some(table) = request.table {
            self.set_table(table);
        }
        if let Some(group_by) = request.group_by {
            self.set_group_by(group_by);
        }
        if let Some(apply) = request.apply {
            self.set_apply(apply);
        }
        if let Some(aggregation) = request.aggregation {
            self.set_aggregation(aggregation);
        }

        let table = self.table.clone().ok_or(ClimateError::NoData)?;

        self.invalid_columns = table.missing_columns(&self.group_by);
        if !self.invalid_columns.is_empty() {
            return Err(ClimateError::InvalidGroupingColumns {
                columns: self.invalid_columns.clone(),
            });
        }

        if let Cache::Grouped { result, .. } = &self.cache {
            debug!("Returning cached group result");
            return Ok(Arc::clone(result));
        }

        if self.group_by.is_empty() {
            if self.directive != Directive::None {
                debug!("No grouping key set, directive ignored");
            }
            self.cache = Cache::Grouped {
                partitions: None,
                result: Arc::clone(&table),
            };
            return Ok(table);
        }

        let (result, partitions) = match &self.directive {
            Directive::Apply(apply) => {
                let partitions = self.partitions(&table)?;
                let result = apply_groups(apply, &table, &partitions, &self.group_by)?;
                (result, Some(partitions))
            }
            Directive::Aggregate(aggregation) => {
                (aggregate_groups(&table, &self.group_by, aggregation)?, None)
            }
            Directive::None => {
                return Err(ClimateError::NoAggregation {
                    group_by: self.group_by.clone(),
                });
            }
        };

        info!(
            "Grouped {} rows by {:?} into {} rows",
            table.height(),
            self.group_by,
            result.height()
        );

        let result = Arc::new(result);
        self.cache = Cache::Grouped {
            partitions,
            result: Arc::clone(&result),
        };
        Ok(result)
    }

    /// Drop the cached result. Partitions survive a directive change,
    /// since they only depend on the table and the key.
    fn invalidate(&mut self, keep_partitions: bool) {
        let partitions = match &self.cache {
            Cache::Stale { partitions } | Cache::Grouped { partitions, .. } if keep_partitions => {
                partitions.clone()
            }
            _ => None,
        };

        self.cache = match self.cache {
            Cache::Empty | Cache::Configured => Cache::Configured,
            Cache::Stale { .. } | Cache::Grouped { .. } => Cache::Stale { partitions },
        };
    }

    fn record(&mut self, conflict: Option<DirectiveConflict>) -> Option<DirectiveConflict> {
        if let Some(conflict) = conflict {
            warn!("{}", conflict);
            self.conflicts.push(conflict);
        }
        conflict
    }

    /// Split the table into groups in first-appearance order, reusing a
    /// previous split when one is still valid
    fn partitions(&self, table: &Table) -> Result<Partitions> {
        if let Cache::Stale {
            partitions: Some(partitions),
        } = &self.cache
        {
            debug!("Reusing {} cached groups", partitions.len());
            return Ok(Arc::clone(partitions));
        }

        let keyed = keyed_rows(table, &self.group_by)?;
        let groups = if keyed.height() == 0 {
            Vec::new()
        } else {
            keyed.partition_by_stable(self.group_by.iter().map(String::as_str), true)?
        };

        debug!("Partitioned table into {} groups", groups.len());
        Ok(Arc::new(groups))
    }
}

fn apply_groups(
    apply: &GroupApply,
    table: &Table,
    partitions: &[DataFrame],
    keys: &[String],
) -> Result<Table> {
    let frames = partitions
        .iter()
        .map(|group| apply.call(group).map(IntoLazy::lazy))
        .collect::<PolarsResult<Vec<LazyFrame>>>()?;

    // No groups: keep the input columns so both directives give a shaped result
    if frames.is_empty() {
        return keyed_table(table.frame().clear(), keys);
    }

    let combined = concat(frames, UnionArgs::default())?.collect()?;
    keyed_table(combined, keys)
}

fn aggregate_groups(table: &Table, keys: &[String], aggregation: &AggSpec) -> Result<Table> {
    let unknown = table.missing_columns(aggregation.columns());
    if !unknown.is_empty() {
        return Err(ClimateError::UnknownAggregationColumns { columns: unknown });
    }

    let key_exprs: Vec<Expr> = keys.iter().map(|key| col(key.as_str())).collect();

    let grouped = keyed_rows(table, keys)?
        .lazy()
        .group_by_stable(key_exprs)
        .agg(aggregation.exprs())
        .collect()?;

    keyed_table(grouped, keys)
}

/// Rows whose grouping key is complete. Rows missing any key value
/// belong to no group.
fn keyed_rows(table: &Table, keys: &[String]) -> Result<DataFrame> {
    let frame = table.frame().clone();
    let Some(present) = keys
        .iter()
        .map(|key| col(key.as_str()).is_not_null())
        .reduce(|all, next| all.and(next))
    else {
        return Ok(frame);
    };

    let keyed = frame.lazy().filter(present).collect()?;
    if keyed.height() < table.height() {
        debug!(
            "Dropped {} rows with a missing grouping key",
            table.height() - keyed.height()
        );
    }
    Ok(keyed)
}

/// A single grouping column becomes the index of the result
fn keyed_table(frame: DataFrame, keys: &[String]) -> Result<Table> {
    match keys {
        [key] if frame.get_column_index(key).is_some() => Table::with_index(frame, key),
        _ => Ok(Table::new(frame)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn monthly_table() -> Arc<Table> {
        let frame = df!(
            "month" => [1i32, 2, 1, 2],
            "tmin_degc" => [2.0, 3.0, 0.0, 1.0],
            "tmax_degc" => [10.0, 12.0, 8.0, 14.0],
        )
        .unwrap();
        Arc::new(Table::new(frame))
    }

    fn counting_apply(counter: Arc<AtomicUsize>) -> GroupApply {
        GroupApply::new("first_row", move |group: &DataFrame| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(group.head(Some(1)))
        })
    }

    fn min_max() -> AggSpec {
        AggSpec::new()
            .with("tmin_degc", Reduction::Min)
            .with("tmax_degc", Reduction::Max)
    }

    #[test]
    fn test_new_aggregator_is_empty() {
        let aggregator = GroupAggregator::new();
        assert_eq!(aggregator.state(), GrouperState::Empty);
        assert_eq!(aggregator.directive(), &Directive::None);
    }

    #[test]
    fn test_no_table_is_no_data() {
        let mut aggregator = GroupAggregator::new();
        let result = aggregator.aggregate(GroupRequest::new().group_by(["month"]));
        assert!(matches!(result, Err(ClimateError::NoData)));
    }

    #[test]
    fn test_invalid_grouping_columns_are_named() {
        let mut aggregator = GroupAggregator::with_table(monthly_table());
        let result = aggregator.aggregate(
            GroupRequest::new()
                .group_by(["nonexistent_col"])
                .aggregate(min_max()),
        );

        match result {
            Err(ClimateError::InvalidGroupingColumns { columns }) => {
                assert_eq!(columns, vec!["nonexistent_col"])
            }
            other => panic!("expected InvalidGroupingColumns, got {:?}", other),
        }
        assert_eq!(aggregator.invalid_columns(), ["nonexistent_col"]);
    }

    #[test]
    fn test_grouping_without_directive_fails() {
        let mut aggregator = GroupAggregator::with_table(monthly_table());
        let result = aggregator.aggregate(GroupRequest::new().group_by(["month"]));
        assert!(matches!(result, Err(ClimateError::NoAggregation { .. })));
    }

    #[test]
    fn test_empty_key_passes_table_through() {
        let table = monthly_table();
        let mut aggregator = GroupAggregator::with_table(Arc::clone(&table));

        let result = aggregator
            .aggregate(GroupRequest::new().aggregate(min_max()))
            .unwrap();

        assert!(Arc::ptr_eq(&result, &table));
        assert_eq!(aggregator.state(), GrouperState::Grouped);
    }

    #[test]
    fn test_aggregation_by_month() {
        let mut aggregator = GroupAggregator::with_table(monthly_table());
        let result = aggregator
            .aggregate(GroupRequest::new().group_by(["month"]).aggregate(min_max()))
            .unwrap();

        assert_eq!(result.index(), Some("month"));
        assert_eq!(result.column_names(), vec!["month", "tmin_degc", "tmax_degc"]);

        let months = result.column("month").unwrap().i32().unwrap();
        let tmin = result.column("tmin_degc").unwrap().f64().unwrap();
        let tmax = result.column("tmax_degc").unwrap().f64().unwrap();

        assert_eq!(months.get(0), Some(1));
        assert_eq!(tmin.get(0), Some(0.0));
        assert_eq!(tmax.get(0), Some(10.0));
        assert_eq!(months.get(1), Some(2));
        assert_eq!(tmin.get(1), Some(1.0));
        assert_eq!(tmax.get(1), Some(14.0));
    }

    #[test]
    fn test_unknown_aggregation_column() {
        let mut aggregator = GroupAggregator::with_table(monthly_table());
        let spec = AggSpec::new().with("rain_mm", Reduction::Sum);
        let result = aggregator.aggregate(GroupRequest::new().group_by(["month"]).aggregate(spec));

        assert!(matches!(
            result,
            Err(ClimateError::UnknownAggregationColumns { columns }) if columns == vec!["rain_mm"]
        ));
    }

    #[test]
    fn test_repeated_call_is_memoized() {
        let counter = Arc::new(AtomicUsize::new(0));
        let apply = counting_apply(Arc::clone(&counter));
        let mut aggregator = GroupAggregator::with_table(monthly_table());

        let request = GroupRequest::new().group_by(["month"]).apply(apply);
        let first = aggregator.aggregate(request.clone()).unwrap();
        let calls = counter.load(Ordering::SeqCst);
        let second = aggregator.aggregate(request).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(counter.load(Ordering::SeqCst), calls);
        // one call per group
        assert_eq!(calls, 2);
        assert_eq!(first.height(), 2);
    }

    #[test]
    fn test_changing_key_recomputes() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut aggregator = GroupAggregator::with_table(monthly_table());
        aggregator.set_apply(counting_apply(Arc::clone(&counter)));

        aggregator
            .aggregate(GroupRequest::new().group_by(["month"]))
            .unwrap();
        let after_first = counter.load(Ordering::SeqCst);

        aggregator
            .aggregate(GroupRequest::new().group_by(["tmin_degc"]))
            .unwrap();

        assert!(counter.load(Ordering::SeqCst) > after_first);
    }

    #[test]
    fn test_equal_table_keeps_cache() {
        let mut aggregator = GroupAggregator::with_table(monthly_table());
        let first = aggregator
            .aggregate(GroupRequest::new().group_by(["month"]).aggregate(min_max()))
            .unwrap();

        // Different allocation, same content
        aggregator.set_table(monthly_table());
        assert_eq!(aggregator.state(), GrouperState::Grouped);

        let second = aggregator.aggregate(GroupRequest::new()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_changed_table_goes_stale() {
        let mut aggregator = GroupAggregator::with_table(monthly_table());
        aggregator
            .aggregate(GroupRequest::new().group_by(["month"]).aggregate(min_max()))
            .unwrap();

        let other = df!("month" => [3i32], "tmin_degc" => [5.0], "tmax_degc" => [15.0]).unwrap();
        aggregator.set_table(Arc::new(Table::new(other)));
        assert_eq!(aggregator.state(), GrouperState::Stale);

        let result = aggregator.aggregate(GroupRequest::new()).unwrap();
        assert_eq!(result.height(), 1);
    }

    /// Every replacement is logged with `warn!` and recorded in the same
    /// place, so `conflicts()` holding one entry means one warning was emitted.
    #[test]
    fn test_aggregation_replaces_apply_with_one_warning() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut aggregator = GroupAggregator::with_table(monthly_table());

        assert_eq!(aggregator.set_apply(counting_apply(Arc::clone(&counter))), None);
        let result = aggregator
            .aggregate(GroupRequest::new().group_by(["month"]).aggregate(min_max()))
            .unwrap();

        assert!(matches!(aggregator.directive(), Directive::Aggregate(_)));
        assert_eq!(
            aggregator.conflicts(),
            [DirectiveConflict::AggregationReplacedApply]
        );
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(result.column_names(), vec!["month", "tmin_degc", "tmax_degc"]);
    }

    #[test]
    fn test_apply_replaces_aggregation() {
        let mut aggregator = GroupAggregator::new();
        aggregator.set_aggregation(min_max());

        let conflict = aggregator.set_apply(GroupApply::new("identity", |g: &DataFrame| {
            Ok(g.clone())
        }));

        assert_eq!(conflict, Some(DirectiveConflict::ApplyReplacedAggregation));
        assert!(matches!(aggregator.directive(), Directive::Apply(_)));
    }

    #[test]
    fn test_same_directive_is_not_a_change() {
        let mut aggregator = GroupAggregator::with_table(monthly_table());
        aggregator
            .aggregate(GroupRequest::new().group_by(["month"]).aggregate(min_max()))
            .unwrap();

        aggregator.set_aggregation(min_max());
        assert_eq!(aggregator.state(), GrouperState::Grouped);
        assert!(aggregator.conflicts().is_empty());
    }

    #[test]
    fn test_directive_change_reuses_partitions() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut aggregator = GroupAggregator::with_table(monthly_table());
        aggregator
            .aggregate(
                GroupRequest::new()
                    .group_by(["month"])
                    .apply(counting_apply(Arc::clone(&counter))),
            )
            .unwrap();

        let last_row = GroupApply::new("last_row", |g: &DataFrame| Ok(g.tail(Some(1))));
        aggregator.set_apply(last_row);
        assert_eq!(aggregator.state(), GrouperState::Stale);

        let result = aggregator.aggregate(GroupRequest::new()).unwrap();
        let tmin = result.column("tmin_degc").unwrap().f64().unwrap();
        assert_eq!(tmin.get(0), Some(0.0));
        assert_eq!(tmin.get(1), Some(1.0));
    }

    #[test]
    fn test_parse_agg_spec() {
        let spec: AggSpec = "tmin_degc=min, tavg_degc=average ,tmax_degc=MAX".parse().unwrap();
        let pairs: Vec<(&str, Reduction)> = spec.iter().collect();

        assert_eq!(
            pairs,
            vec![
                ("tmin_degc", Reduction::Min),
                ("tavg_degc", Reduction::Mean),
                ("tmax_degc", Reduction::Max),
            ]
        );
        assert_eq!(spec.to_string(), "tmin_degc=min,tavg_degc=mean,tmax_degc=max");
    }

    #[test]
    fn test_parse_bad_agg_spec() {
        assert!(matches!(
            "tmin_degc".parse::<AggSpec>(),
            Err(ClimateError::Configuration { .. })
        ));
        assert!(matches!(
            "tmin_degc=mode".parse::<AggSpec>(),
            Err(ClimateError::InvalidReduction { name }) if name == "mode"
        ));
    }

    #[test]
    fn test_apply_identity_requires_shared_function() {
        let a = GroupApply::new("noop", |g: &DataFrame| Ok(g.clone()));
        let b = a.clone();
        let c = GroupApply::new("noop", |g: &DataFrame| Ok(g.clone()));

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    fn table_with_missing_month() -> Arc<Table> {
        let frame = df!(
            "month" => [Some(1i32), None, Some(1)],
            "tmin_degc" => [2.0, -9.0, 0.0],
            "tmax_degc" => [10.0, 40.0, 8.0],
        )
        .unwrap();
        Arc::new(Table::new(frame))
    }

    #[test]
    fn test_missing_key_rows_are_dropped_from_aggregation() {
        let mut aggregator = GroupAggregator::with_table(table_with_missing_month());
        let result = aggregator
            .aggregate(GroupRequest::new().group_by(["month"]).aggregate(min_max()))
            .unwrap();

        assert_eq!(result.height(), 1);
        let tmin = result.column("tmin_degc").unwrap().f64().unwrap();
        let tmax = result.column("tmax_degc").unwrap().f64().unwrap();
        assert_eq!(tmin.get(0), Some(0.0));
        assert_eq!(tmax.get(0), Some(10.0));
    }

    #[test]
    fn test_missing_key_rows_are_dropped_from_apply() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut aggregator = GroupAggregator::with_table(table_with_missing_month());

        let result = aggregator
            .aggregate(
                GroupRequest::new()
                    .group_by(["month"])
                    .apply(counting_apply(Arc::clone(&counter))),
            )
            .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(result.height(), 1);
        assert_eq!(result.column("month").unwrap().i32().unwrap().get(0), Some(1));
    }

    #[test]
    fn test_apply_on_empty_table_keeps_columns() {
        let frame = df!(
            "month" => Vec::<i32>::new(),
            "tmin_degc" => Vec::<f64>::new(),
        )
        .unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let mut aggregator = GroupAggregator::with_table(Arc::new(Table::new(frame)));

        let result = aggregator
            .aggregate(
                GroupRequest::new()
                    .group_by(["month"])
                    .apply(counting_apply(Arc::clone(&counter))),
            )
            .unwrap();

        assert!(result.is_empty());
        assert_eq!(result.index(), Some("month"));
        assert_eq!(result.column_names(), vec!["month", "tmin_degc"]);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
