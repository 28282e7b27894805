pub const RASPA_LIB_ENV: &str = "ELKPI_RASPA_LIB";
pub const BLOCK_SIZE_ENV: &str = "ELKPI_BLOCK_SIZE";
pub const RASPA_DEBUG_ENV: &str = "ELKPI_RASPA_DEBUG";
pub const TRANSPORT_ENV: &str = "ELKPI_TRANSPORT";

pub const DEFAULT_BLOCK_SIZE: usize = 512;
pub const DEFAULT_RASPA_LIB: &str = "libraspa.so";

/// Debug flag understood by `raspa_open`: log mode switches of the RT task.
pub const RASPA_DEBUG_SIGNAL_ON_MODE_SW: u32 = 1 << 0;

pub fn flag_value(value: &str) -> bool {
    let s = value.trim().to_ascii_lowercase();
    s == "1" || s == "true" || s == "yes" || s == "on"
}
