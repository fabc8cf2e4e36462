use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use log::debug;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::core_error::ClientError;
use crate::core_ftpclient::commands::SharedClient;
use crate::core_interpreter::interpreter::Interpreter;

/// Interactive operator loop: read one line, dispatch it to completion,
/// report any error, prompt again. Errors never terminate the loop;
/// only end of input does.
pub async fn run(interpreter: Interpreter<SharedClient>, client: SharedClient) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        print!(">> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        if let Err(e) = interpreter.execute(&line, Arc::clone(&client)).await {
            debug!("Command failed ({})", error_kind(&e));
            println!("{}", e.to_string().red());
        }
    }

    Ok(())
}

fn error_kind(error: &ClientError) -> &'static str {
    match error {
        ClientError::Input(_) => "input",
        ClientError::Protocol(_) => "protocol",
        ClientError::Transport(_) => "transport",
        ClientError::Storage(_) => "storage",
    }
}
