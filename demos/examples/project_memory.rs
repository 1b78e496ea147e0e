//! Demonstrates project memory's across-turn persistence: the first run
//! writes architecture/component notes; a second run against the same
//! workspace loads them back and appends to the file-tree section.
//!
//! Run twice with the same working directory to see persistence:
//! `cargo run -p orchestrator-demos --example project_memory`

use workspace::{read_memory, write_memory, ARCHITECTURE, COMPONENTS, FILE_TREE};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::temp_dir().join("orchestrator-demo-project-memory/project_context.md");

    let mut memory = read_memory(path.clone()).await?;
    let is_first_run = memory.get(ARCHITECTURE).is_none();

    if is_first_run {
        println!("no memory on disk yet -- seeding it");
        memory.update(ARCHITECTURE, "A Vite + React SPA with a thin Express API.");
        memory.update(COMPONENTS, "- Header\n- LandingHero");
    } else {
        println!("loaded existing memory from {}", path.display());
    }
    memory.append_line(FILE_TREE, "src/App.tsx");

    write_memory(path.clone(), &memory).await?;

    println!("\n--- project_context.md ---");
    print!("{}", memory.render());
    println!("---------------------------");
    println!("\nrun this example again to see the file tree section grow");

    Ok(())
}
