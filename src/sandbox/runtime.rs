//! One V8 isolate, one page.
//!
//! Provides only what page generators need:
//! - console.log/info/debug/warn/error (captured, not printed)
//! - crypto.randomUUID, crypto.getRandomValues
//! - atob, btoa
//! - Module loading from the project and its dependencies only
//! - No fs, net, env, or other system access

use std::path::Path;
use std::rc::Rc;

use deno_core::anyhow::{anyhow, Error};
use deno_core::{v8, JsRuntime, ModuleSpecifier, PollEventLoopOptions, RuntimeOptions};

use super::loader::SandboxedLoader;
use super::ops::{elbebe_render, ConsoleOutput};
use super::SandboxConfig;

/// Markup produced by a generator plus whatever it logged.
#[derive(Debug)]
pub struct RenderOutput {
    pub markup: String,
    pub console: ConsoleOutput,
}

pub fn create_runtime(config: &SandboxConfig, loader: SandboxedLoader) -> JsRuntime {
    let create_params = config
        .max_heap_size
        .map(|max_bytes| v8::Isolate::create_params().heap_limits(0, max_bytes));

    let mut runtime = JsRuntime::new(RuntimeOptions {
        module_loader: Some(Rc::new(loader)),
        extensions: vec![elbebe_render::init_ops_and_esm()],
        create_params,
        ..Default::default()
    });

    if config.max_heap_size.is_some() {
        // Terminate instead of letting V8 abort the whole process, and
        // grant some headroom so termination can unwind.
        let handle = runtime.v8_isolate().thread_safe_handle();
        runtime.add_near_heap_limit_callback(move |current, initial| {
            tracing::warn!(
                current_mb = current / (1024 * 1024),
                initial_mb = initial / (1024 * 1024),
                "Render near heap limit, terminating"
            );
            handle.terminate_execution();
            current * 2
        });
    }

    runtime.op_state().borrow_mut().put(ConsoleOutput::default());
    runtime
}

/// Import `entry_point` and evaluate its default export.
///
/// # Expected JS module format
/// ```js
/// export default "<p>static markup</p>";
/// // or
/// export default function render() {
///   return "<html>...</html>";
/// }
/// ```
pub async fn render_module(runtime: &mut JsRuntime, entry_point: &Path) -> Result<RenderOutput, Error> {
    let entry_path = entry_point
        .canonicalize()
        .map_err(|e| anyhow!("Invalid generator '{}': {}", entry_point.display(), e))?;

    let module_specifier = ModuleSpecifier::from_file_path(&entry_path)
        .map_err(|_| anyhow!("Failed to create module specifier"))?;

    let render_code = format!(
        "globalThis.__elbebe_render__({})",
        serde_json::to_string(module_specifier.as_str())?
    );

    let markup_global = runtime.execute_script("<elbebe:render>", render_code)?;

    runtime
        .run_event_loop(PollEventLoopOptions::default())
        .await?;

    let markup = {
        let scope = &mut runtime.handle_scope();
        let local = v8::Local::new(scope, &markup_global);

        let promise = v8::Local::<v8::Promise>::try_from(local)
            .map_err(|_| anyhow!("Render entry did not return a promise"))?;
        match promise.state() {
            v8::PromiseState::Fulfilled => {
                let result = promise.result(scope);
                if !result.is_string() {
                    return Err(anyhow!("Generator must produce a string"));
                }
                result.to_rust_string_lossy(scope)
            }
            v8::PromiseState::Rejected => {
                let exception = promise.result(scope);
                return Err(anyhow!("{}", describe_exception(scope, exception)));
            }
            v8::PromiseState::Pending => {
                return Err(anyhow!("Generator returned a promise that never settled"));
            }
        }
    };

    let console = runtime
        .op_state()
        .borrow_mut()
        .take::<ConsoleOutput>();

    Ok(RenderOutput { markup, console })
}

/// The exception's stack when it has one, its string form otherwise.
fn describe_exception<'s>(
    scope: &mut v8::HandleScope<'s>,
    exception: v8::Local<'s, v8::Value>,
) -> String {
    if let Ok(object) = v8::Local::<v8::Object>::try_from(exception) {
        if let Some(key) = v8::String::new(scope, "stack") {
            if let Some(stack) = object.get(scope, key.into()) {
                if stack.is_string() {
                    return stack.to_rust_string_lossy(scope);
                }
            }
        }
    }
    exception.to_rust_string_lossy(scope)
}
