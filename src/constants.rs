//! Column names, fixed mappings and default values.

// =============================================================================
// Source Columns (as emitted by the index-composition scraper)
// =============================================================================

pub const SOURCE_CODIGO: &str = "Código";
pub const SOURCE_ACAO: &str = "Ação";
pub const SOURCE_TIPO: &str = "Tipo";
pub const SOURCE_QUANTIDADE_TEORICA: &str = "Qtde. Teórica";
pub const SOURCE_PARTICIPACAO: &str = "Part. (%)";

// =============================================================================
// Canonical Columns
// =============================================================================

pub const CODIGO: &str = "codigo";
pub const ACAO: &str = "acao";
pub const TIPO: &str = "tipo";
pub const QUANTIDADE_TEORICA: &str = "quantidade_teorica";
pub const PARTICIPACAO_PERCENTUAL: &str = "participacao_percentual";
pub const DATA_REFERENCIA: &str = "data_referencia";
pub const DIAS_ULTIMA_DATA_REFERENCIA: &str = "quantidade_dias_ultima_data_referencia";

// Derived by the aggregator
pub const QUANTIDADE_TEORICA_TOTAL: &str = "quantidade_teorica_total";
pub const QUANTIDADE_TEORICA_ACAO: &str = "quantidade_teorica_acao";
pub const PARTICIPACAO_PERCENTUAL_ACAO: &str = "participacao_percentual_acao";

/// Source column -> canonical column
pub const RENAME_MAP: &[(&str, &str)] = &[
    (SOURCE_CODIGO, CODIGO),
    (SOURCE_ACAO, ACAO),
    (SOURCE_TIPO, TIPO),
    (SOURCE_QUANTIDADE_TEORICA, QUANTIDADE_TEORICA),
    (SOURCE_PARTICIPACAO, PARTICIPACAO_PERCENTUAL),
];

/// Column order of the enriched output table
pub const OUTPUT_COLUMNS: &[&str] = &[
    CODIGO,
    ACAO,
    TIPO,
    QUANTIDADE_TEORICA,
    PARTICIPACAO_PERCENTUAL,
    QUANTIDADE_TEORICA_TOTAL,
    QUANTIDADE_TEORICA_ACAO,
    PARTICIPACAO_PERCENTUAL_ACAO,
    DIAS_ULTIMA_DATA_REFERENCIA,
    DATA_REFERENCIA,
];

// =============================================================================
// Numeric Encodings
// =============================================================================

/// Thousands separator in quantities ("1.234.567")
pub const THOUSANDS_SEPARATOR: &str = ".";

/// Decimal separator in percentages ("12,34")
pub const DECIMAL_SEPARATOR: &str = ",";

/// Accepted quantity text: digits, optionally grouped by thousands separators
pub const QUANTITY_PATTERN: &str = r"^[0-9]+(\.[0-9]{3})*$";

/// Accepted percentage text: optional sign, digits, optional decimal part
pub const PERCENTAGE_PATTERN: &str = r"^-?[0-9]+(,[0-9]+)?$";

// =============================================================================
// Storage Layout
// =============================================================================

pub const DEFAULT_RAW_BUCKET: &str = "data";
pub const DEFAULT_RAW_PREFIX: &str = "raw/b3_data";
pub const DEFAULT_OUTPUT_PATH: &str = "data/refined/b3_data";
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";
pub const DEFAULT_PARTITION_KEYS: &[&str] = &[DATA_REFERENCIA, ACAO];

/// Extension of the columnar files making up a partition
pub const PARQUET_EXTENSION: &str = "parquet";

/// Directory value used for a null partition key
pub const HIVE_DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

/// Config file location under the user config directory
pub const CONFIG_DIR_NAME: &str = "b3-refiner";
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Number of offending values quoted in a cast error
pub const CAST_ERROR_SAMPLES: usize = 5;
