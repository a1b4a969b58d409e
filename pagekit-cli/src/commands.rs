//! Command handlers. Each returns the text to print.

use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::Context as _;
use pagekit_core::{DropTarget, Element, ElementId, ElementPatch, Forest, InsertionPolicy, Project};
use pagekit_sync::{ElementRepository, ElementStore, ProjectRepository};

use crate::config::Command;

/// Run one command against the given repositories.
pub async fn run(
    command: Command,
    project: Option<&str>,
    elements: Arc<dyn ElementRepository>,
    projects: &dyn ProjectRepository,
) -> anyhow::Result<String> {
    let require_project = || {
        project
            .ok_or_else(|| anyhow::anyhow!("no project given (use --project or PAGEKIT_PROJECT)"))
    };

    match command {
        Command::Projects => {
            let listed = projects.list_all().await.context("listing projects")?;
            Ok(render_projects(&listed))
        }
        Command::NewProject { name, description } => {
            let created = projects
                .create(Project::new(name).with_description(description))
                .await
                .context("creating project")?;
            Ok(format!("created project {} ({})", created.name, created.id))
        }
        Command::Tree { public: Some(scope) } => {
            let store = ElementStore::load_public(elements, &scope).await?;
            Ok(render_tree(&store.current_forest()))
        }
        Command::Tree { public: None } => {
            let store = ElementStore::load(elements, require_project()?).await?;
            Ok(render_tree(&store.current_forest()))
        }
        Command::Add {
            element_type,
            on,
            x,
            y,
        } => {
            let project = require_project()?;
            let store = ElementStore::load(elements, project).await?;
            let target = match on {
                Some(id) => DropTarget::Element {
                    id: ElementId::from(id),
                    x,
                    y,
                },
                None => DropTarget::Canvas { x, y },
            };
            let insertion = InsertionPolicy::new(project).drop_on(
                &store.current_forest(),
                element_type,
                &target,
            )?;
            let id = insertion.element.id.clone();
            let parent = insertion.parent_id.clone();
            store.insert(insertion)?.await?;
            Ok(match parent {
                Some(parent) => format!("created {element_type} {id} in {parent}"),
                None => format!("created {element_type} {id}"),
            })
        }
        Command::Update { id, patch } => {
            let patch: ElementPatch =
                serde_json::from_str(&patch).context("patch is not a valid element patch")?;
            let store = ElementStore::load(elements, require_project()?).await?;
            store.update(&id, patch)?.await?;
            Ok(format!("updated {id}"))
        }
        Command::Delete { id } => {
            let store = ElementStore::load(elements, require_project()?).await?;
            let children = store
                .current_forest()
                .find_by_id(&id)
                .map_or(0, |e| e.children().len());
            store.delete(&id)?.await?;
            Ok(format!("deleted {id}, {children} children moved to the root"))
        }
        Command::Swap { first, second } => {
            let store = ElementStore::load(elements, require_project()?).await?;
            store.swap(&first, &second)?.await?;
            Ok(format!("swapped {first} and {second}"))
        }
    }
}

fn render_projects(projects: &[Project]) -> String {
    if projects.is_empty() {
        return "no projects".to_string();
    }
    let mut out = String::new();
    for project in projects {
        let _ = writeln!(out, "{}  {}", project.id, project.name);
    }
    out
}

/// Indented outline of a forest, one element per line.
pub fn render_tree(forest: &Forest) -> String {
    fn walk(out: &mut String, elements: &[Element], depth: usize) {
        for element in elements {
            let _ = write!(
                out,
                "{:indent$}{} {} (order {})",
                "",
                element.type_name(),
                element.id,
                element.order,
                indent = depth * 2
            );
            if !element.content.is_empty() {
                let _ = write!(out, " {:?}", element.content);
            }
            out.push('\n');
            walk(out, element.children(), depth + 1);
        }
    }

    if forest.is_empty() {
        return "empty project".to_string();
    }
    let mut out = String::new();
    walk(&mut out, forest.roots(), 0);
    out
}
