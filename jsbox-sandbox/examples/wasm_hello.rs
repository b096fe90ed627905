//! WASM runner example - a WAT module standing in for the QuickJS build
//!
//! Pass a path to a real `qjs` WASI build to run JavaScript instead:
//! `cargo run --example wasm_hello -- ~/.local/share/jsbox/qjs-wasi.wasm`

use jsbox_sandbox::{ExecuteOptions, ExecutionLimits, QuickJsRunner, SandboxService};
use std::path::Path;
use std::sync::Arc;

const HELLO_WAT: &str = r#"
(module
    (import "wasi_snapshot_preview1" "fd_write"
        (func $fd_write (param i32 i32 i32 i32) (result i32)))

    (memory 1)
    (export "memory" (memory 0))

    (data (i32.const 0) "Hello from WASM!\n")

    (func $main (export "_start")
        ;; iovec structure at offset 100
        (i32.store (i32.const 100) (i32.const 0))   ;; buf pointer
        (i32.store (i32.const 104) (i32.const 17))  ;; buf length

        ;; fd_write(stdout, iovs, 1, nwritten)
        (call $fd_write (i32.const 1) (i32.const 100) (i32.const 1) (i32.const 108))
        drop
    )
)
"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("=== WASM Runner Demo ===\n");

    let runner = match std::env::args().nth(1) {
        Some(path) => QuickJsRunner::from_file(Path::new(&path))?,
        None => {
            let module = wat::parse_str(HELLO_WAT)?;
            println!("Compiled stand-in module ({} bytes)\n", module.len());
            QuickJsRunner::from_binary(&module)?
        }
    };
    let service = SandboxService::new(Arc::new(runner), ExecutionLimits::default());

    let result = service
        .execute_script(
            "console.log('Hello from QuickJS!')",
            ExecuteOptions::with_timeout(5_000),
        )
        .await?;

    print!("stdout: {}", result.stdout);
    println!("exit_code: {}", result.exit_code);
    if let Some(error) = result.error {
        println!("error: {}", error);
    }

    Ok(())
}
