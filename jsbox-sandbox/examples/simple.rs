//! Simple sandbox example - run a few scripts through the coordinator
//!
//! Uses `/bin/sh` as the interpreter so it runs without a QuickJS build.

use jsbox_sandbox::{
    ExecuteOptions, ExecutionLimits, ExecutionRequest, ProcessRunner, SandboxService,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let runner = ProcessRunner::new("/bin/sh", vec![])
        .with_env("PATH", "/usr/bin:/bin");
    let service = SandboxService::new(Arc::new(runner), ExecutionLimits::default());

    println!("=== Sandbox Service Example ===\n");
    println!("Runner: {}\n", service.runner_name());

    println!("Example 1: Simple echo");
    execute_and_print(&service, ExecutionRequest::new("echo 'Hello from sandbox!'")).await;

    println!("\nExample 2: Count to 5");
    execute_and_print(
        &service,
        ExecutionRequest::new("for i in 1 2 3 4 5; do echo $i; done"),
    )
    .await;

    println!("\nExample 3: Long running task with timeout");
    execute_and_print(
        &service,
        ExecutionRequest::new("sleep 10 && echo 'Done!'").with_timeout(500),
    )
    .await;

    println!("\nExample 4: Error to stderr");
    execute_and_print(
        &service,
        ExecutionRequest::new("echo 'Error message' >&2; exit 1"),
    )
    .await;

    println!("\nExample 5: Empty script");
    execute_and_print(&service, ExecutionRequest::new("")).await;

    Ok(())
}

async fn execute_and_print(service: &SandboxService, request: ExecutionRequest) {
    let options: ExecuteOptions = request.options();
    match service.execute_script(&request.code, options).await {
        Ok(result) => {
            print!("  stdout: {}", result.stdout);
            if !result.stderr.is_empty() {
                print!("  stderr: {}", result.stderr);
            }
            println!("  Result: exit_code={}", result.exit_code);
            if let Some(error) = result.error {
                println!("  Error: {}", error);
            }
        }
        Err(e) => println!("  Rejected: {}", e),
    }
}
