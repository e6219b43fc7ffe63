/// Column names shared by the loaders, cleaners and the feature builder.
pub const COUNTRY: &str = "Country";

pub const LIFE_EXPECTANCY_BOTH: &str = "LifeExpectancy_Both";
pub const LIFE_EXPECTANCY_FEMALE: &str = "LifeExpectancy_Female";
pub const LIFE_EXPECTANCY_MALE: &str = "LifeExpectancy_Male";
pub const URBAN_POPULATION_PERCENTAGE: &str = "UrbanPopulation_Percentage";
pub const URBAN_POPULATION_ABSOLUTE: &str = "UrbanPopulation_Absolute";
pub const POPULATION_DENSITY: &str = "PopulationDensity";

pub const GDP_PER_CAPITA_PPP: &str = "GDP_per_capita_PPP";
pub const POPULATION: &str = "Population";

pub const TOTAL_GDP: &str = "TotalGDP";
pub const LOG_GDP_PER_CAPITA: &str = "LogGDPperCapita";
pub const LOG_POPULATION: &str = "LogPopulation";

/// The six numeric demographics fields, in output order.
pub const DEMOGRAPHICS_FIELDS: [&str; 6] = [
    LIFE_EXPECTANCY_BOTH,
    LIFE_EXPECTANCY_FEMALE,
    LIFE_EXPECTANCY_MALE,
    URBAN_POPULATION_PERCENTAGE,
    URBAN_POPULATION_ABSOLUTE,
    POPULATION_DENSITY,
];

/// Columns of the final feature matrix, in order.
pub const SELECTED_FEATURES: [&str; 3] = [LIFE_EXPECTANCY_BOTH, LOG_GDP_PER_CAPITA, LOG_POPULATION];

/// Cell contents treated as a missing value on load.
pub const NA_VALUES: [&str; 7] = ["", "None", "NA", "N/A", "NaN", "nan", "null"];

// Output file names, all written under the configured output directory
pub const DEMOGRAPHICS_RAW_CSV: &str = "demographics_data.csv";
pub const DEMOGRAPHICS_BEFORE_SORT_CSV: &str = "demographics_before_sort.csv";
pub const DEMOGRAPHICS_AFTER_SORT_CSV: &str = "demographics_after_sort.csv";
pub const GDP_BEFORE_SORT_CSV: &str = "gdp_before_sort.csv";
pub const GDP_AFTER_SORT_CSV: &str = "gdp_after_sort.csv";
pub const POP_BEFORE_SORT_CSV: &str = "pop_before_sort.csv";
pub const POP_AFTER_SORT_CSV: &str = "pop_after_sort.csv";
pub const GDP_DESCRIBE_CSV: &str = "gdp_describe.csv";
pub const POP_DESCRIBE_CSV: &str = "pop_describe.csv";
pub const FIELD_STATS_CSV: &str = "stats.csv";
pub const NAME_MISMATCHES_CSV: &str = "name_mismatches.csv";
pub const DROPPED_GDP_CSV: &str = "dropped_gdp.csv";
pub const LOST_COUNTRIES_CSV: &str = "lost_countries.csv";
pub const FEATURE_MATRIX_NPY: &str = "X.npy";
pub const RUN_SUMMARY_JSON: &str = "run_summary.json";

// Default input file names
pub const GDP_PER_CAPITA_2021: &str = "gdp_per_capita_2021.csv";
pub const POPULATION_2021: &str = "population_2021.csv";

// Crawler
pub const WORLDOMETERS_BASE_URL: &str = "https://www.worldometers.info";
pub const DEMOGRAPHICS_HEADING: &str = "Demographics of Countries";
pub const REQUEST_TIMEOUT_SECS: u64 = 15;
pub const INDEX_DELAY_MS: u64 = 800;
pub const COUNTRY_PAGE_DELAY_MS: u64 = 300;
