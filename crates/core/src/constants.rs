/// Constants used throughout the pdict codebase
// Environment variable names
pub const ENV_SERIALIZER: &str = "PDICT_SERIALIZER";
pub const ENV_COMPRESSION: &str = "PDICT_COMPRESSION";
pub const ENV_COMPRESSION_LEVEL: &str = "PDICT_COMPRESSION_LEVEL";
pub const ENV_BASE_KEY: &str = "PDICT_BASE_KEY";
pub const ENV_EXPIRATION: &str = "PDICT_EXPIRATION";
pub const ENV_HSET_DISABLED: &str = "PDICT_HSET_DISABLED";
pub const ENV_ASYNC_ENABLED: &str = "PDICT_ASYNC_ENABLED";
pub const ENV_ENCODING: &str = "PDICT_ENCODING";
pub const ENV_BACKEND: &str = "PDICT_BACKEND";
pub const ENV_REDIS_URL: &str = "PDICT_REDIS_URL";
pub const ENV_DATA_DIR: &str = "PDICT_DATA_DIR";
pub const ENV_LOG: &str = "PDICT_LOG";

// Directory and file names
pub const APP_DIR_NAME: &str = "pdict";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const CONFIG_SECTION: &str = "persistence";
pub const CACHE_FILE_EXTENSION: &str = "cache";
pub const LOCK_FILE_EXTENSION: &str = "lock";
pub const TOKEN_FILE_EXTENSION: &str = "hash";
pub const DEFAULT_NAME: &str = "global";

// Key separators
pub const REDIS_KEY_SEPARATOR: &str = ":";
pub const LOCAL_KEY_SEPARATOR: &str = ".";
pub const CHILD_KEY_SEPARATOR: &str = ":";

// Type tag envelope fields
pub const TYPE_TAG: &str = "__type__";
pub const CLASS_TAG: &str = "__class__";
pub const VALUE_FIELD: &str = "value";
pub const VALUES_FIELD: &str = "values";

// Only encoding accepted for the on-disk document
pub const DEFAULT_ENCODING: &str = "utf-8";
