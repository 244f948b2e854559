use std::{env, fs, path::Path};

use ts_rs::TS;

fn generate_types_content() -> String {
    // 4 space indentation
    let decls: Vec<String> = vec![
        utils::response::ApiResponse::<()>::decl(),
        db::models::stage::Stage::decl(),
        db::models::stage::StagesResponse::decl(),
        db::models::stage::CreateStage::decl(),
        db::models::stage::UpdateStage::decl(),
        db::models::project::ProjectPriority::decl(),
        db::models::project::Project::decl(),
        db::models::project::ProjectMilestone::decl(),
        db::models::project::ProjectDetails::decl(),
        db::models::project::CreateProject::decl(),
        db::models::project::UpdateProject::decl(),
        db::models::project::UpdateProjectStage::decl(),
        db::models::project::ProjectListing::decl(),
        db::models::project::ProjectsResponse::decl(),
        db::models::team::TeamRole::decl(),
        db::models::team::Team::decl(),
        db::models::team::TeamMember::decl(),
        db::models::team::CreateTeam::decl(),
        db::models::team::AddTeamMember::decl(),
        db::models::contact::Contact::decl(),
        db::models::contact::CreateContact::decl(),
        db::models::contact::UpdateContact::decl(),
        server::routes::health::HealthStatus::decl(),
        server::routes::ai::ProjectSuggestionRequest::decl(),
        server::routes::ai::ProjectSuggestionResponse::decl(),
    ];

    let body = decls
        .into_iter()
        .map(|d| {
            let trimmed = d.trim_start();
            if trimmed.starts_with("export") {
                trimmed.to_string()
            } else {
                format!("export {trimmed}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "// This file was generated by `crates/server/src/bin/generate_types.rs`.\n\n\
         // Do not edit this file manually.\n\n\
         {body}\n"
    )
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let check_mode = args.iter().any(|arg| arg == "--check");

    let shared_path = Path::new("shared");
    let types_path = shared_path.join("types.ts");
    let generated = generate_types_content();

    if check_mode {
        let current = fs::read_to_string(&types_path).unwrap_or_default();
        if current == generated {
            println!("✅ shared/types.ts is up to date.");
            std::process::exit(0);
        } else {
            eprintln!("❌ shared/types.ts is not up to date. Please run 'cargo run --bin generate_types' and commit the changes.");
            std::process::exit(1);
        }
    }

    println!("Generating TypeScript types…");
    if let Err(e) = fs::create_dir_all(shared_path).and_then(|_| fs::write(&types_path, generated)) {
        eprintln!("Failed to write {}: {e}", types_path.display());
        std::process::exit(1);
    }
    println!("✅ TypeScript types generated in shared/");
}
