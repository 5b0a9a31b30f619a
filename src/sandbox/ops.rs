//! Ops backing the globals defined in `bootstrap.js`.

use deno_core::anyhow::{anyhow, Error};
use deno_core::{op2, OpState};

/// Console output captured during one render.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConsoleOutput {
    pub logs: Vec<String>,
    pub warns: Vec<String>,
    pub errors: Vec<String>,
}

/// Console level codes passed from `bootstrap.js`.
const LEVEL_WARN: u32 = 1;
const LEVEL_ERROR: u32 = 2;

impl ConsoleOutput {
    /// `log`, `info` and `debug` all land in `logs`.
    fn record(&mut self, level: u32, line: String) {
        match level {
            LEVEL_WARN => self.warns.push(line),
            LEVEL_ERROR => self.errors.push(line),
            _ => self.logs.push(line),
        }
    }
}

#[op2(fast)]
fn op_console_write(state: &mut OpState, level: u32, #[string] line: &str) {
    if let Some(output) = state.try_borrow_mut::<ConsoleOutput>() {
        output.record(level, line.to_string());
    }
}

#[op2]
#[string]
fn op_crypto_random_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[op2(fast)]
fn op_crypto_get_random_values(#[buffer] buf: &mut [u8]) {
    use rand::RngCore;
    rand::thread_rng().fill_bytes(buf);
}

/// Encodes the UTF-8 bytes of `data`; characters above U+00FF do not throw.
#[op2]
#[string]
fn op_btoa(#[string] data: &str) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(data.as_bytes())
}

#[op2]
#[string]
fn op_atob(#[string] data: &str) -> Result<String, Error> {
    use base64::Engine;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| anyhow!("Invalid base64: {}", e))?;
    String::from_utf8(bytes).map_err(|e| anyhow!("Invalid UTF-8 in decoded data: {}", e))
}

deno_core::extension!(
    elbebe_render,
    ops = [
        op_console_write,
        op_crypto_random_uuid,
        op_crypto_get_random_values,
        op_btoa,
        op_atob,
    ],
    esm_entry_point = "ext:elbebe_render/bootstrap.js",
    esm = ["ext:elbebe_render/bootstrap.js" = "src/sandbox/bootstrap.js"],
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_levels() {
        let mut output = ConsoleOutput::default();
        output.record(0, "plain".to_string());
        output.record(LEVEL_WARN, "careful".to_string());
        output.record(LEVEL_ERROR, "broken".to_string());
        output.record(7, "unknown level".to_string());

        assert_eq!(output.logs, ["plain", "unknown level"]);
        assert_eq!(output.warns, ["careful"]);
        assert_eq!(output.errors, ["broken"]);
    }
}
