use anyhow::Result;

use crate::cli::Workspace;
use crate::query::FunctionContext;

pub async fn show_context(function: String, repo: String, format: String) -> Result<()> {
    let workspace = Workspace::open(&repo);
    let engine = workspace.engine()?;

    let context = engine.build_context(&function);

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&context)?),
        "text" => print_text(&function, &context),
        _ => {
            eprintln!("Unknown format: {}", format);
            std::process::exit(1);
        }
    }

    if context.target.is_none() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_text(function: &str, context: &FunctionContext) {
    let Some(target) = &context.target else {
        println!("Function '{}' not found in index", function);
        return;
    };

    println!("{} ({})", target.function, target.file);
    println!(
        "calls {} resolved function(s), called by {} function(s)\n",
        target.called_count, target.called_by_count
    );
    println!("{}\n", target.code);

    if !context.internal.is_empty() {
        println!("--- internal ---");
        for block in &context.internal {
            println!("\n{} ({})", block.function, block.file);
            println!("{}", block.code);
        }
        println!();
    }

    if !context.caller.is_empty() {
        println!("--- callers ---");
        for block in &context.caller {
            println!("\n{} ({})", block.label, block.file);
            println!("{}", block.code);
        }
    }
}
