//! Application constants for station data processing
//!
//! Column names, annotation markers and defaults for the Met Office
//! historic station data format.

// =============================================================================
// Station File Schema
// =============================================================================

pub const YEAR_COLUMN: &str = "year";
pub const MONTH_COLUMN: &str = "month";
pub const TMAX_COLUMN: &str = "tmax_degc";
pub const TMIN_COLUMN: &str = "tmin_degc";
pub const AIR_FROST_COLUMN: &str = "af_days";
pub const RAIN_COLUMN: &str = "rain_mm";
pub const SUN_COLUMN: &str = "sun_hours";

/// Data columns in file order
pub const STATION_COLUMNS: &[&str] = &[
    YEAR_COLUMN,
    MONTH_COLUMN,
    TMAX_COLUMN,
    TMIN_COLUMN,
    AIR_FROST_COLUMN,
    RAIN_COLUMN,
    SUN_COLUMN,
];

/// Columns that hold whole numbers
pub const INTEGER_COLUMNS: &[&str] = &[YEAR_COLUMN, MONTH_COLUMN];

// =============================================================================
// Derived Columns
// =============================================================================

/// Monthly date key, used as the table index
pub const DATE_COLUMN: &str = "date";

/// Mean of the monthly maximum and minimum temperatures
pub const TAVG_COLUMN: &str = "tavg_degc";

/// Monthly data has no day; every date is pinned to the first of the month
pub const DEFAULT_DAY_OF_MONTH: u32 = 1;

// =============================================================================
// Parsing Defaults
// =============================================================================

/// One or more whitespace characters
pub const DEFAULT_DELIMITER: &str = r"\s+";

/// Provider annotations appended to sunshine values
/// (`#` = Kipp & Zonen sensor, `*` = estimated)
pub const ANNOTATION_MARKERS: &[char] = &['#', '*'];

// =============================================================================
// Month Profile Histogram
// =============================================================================

pub const HISTOGRAM_START_DEGC: f64 = -5.0;
pub const HISTOGRAM_END_DEGC: f64 = 40.0;
pub const HISTOGRAM_STEP_DEGC: f64 = 0.5;

/// Columns histogrammed by the month profile
pub const PROFILE_COLUMNS: &[&str] = &[TMIN_COLUMN, TAVG_COLUMN, TMAX_COLUMN];
