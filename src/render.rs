/// ASCII tree rendering
///
/// Draws the project tree for the CLI: folders, assets and their tasks.

use crate::error::Result;
use crate::model::{FolderId, ProjectTree};

const FOLDER: char = '▸';
const ASSET: char = '◆';
const TASK: char = '•';

/// Render the whole project below its root.
///
/// Example output:
/// ```text
/// project
/// ├── ▸ chars
/// │   └── ◆ Hero
/// │       ├── • Modelling
/// │       └── • Rigging
/// └── ◆ Rock
/// ```
pub fn render_tree(tree: &ProjectTree) -> Result<String> {
    let mut output = String::new();
    let root = tree.folder(tree.root())?;
    output.push_str(&root.name());
    output.push('\n');
    render_folder(&mut output, tree, tree.root(), "")?;
    Ok(output)
}

// Subfolders come first, then assets, matching the tree's child order.
fn render_folder(output: &mut String, tree: &ProjectTree, id: FolderId, prefix: &str) -> Result<()> {
    let folder = tree.folder(id)?;
    let total = folder.subfolders.len() + folder.assets.len();
    let mut index = 0;

    for child in &folder.subfolders {
        index += 1;
        let is_last = index == total;
        let name = tree.folder(*child)?.name();
        push_line(output, prefix, is_last, FOLDER, &name);
        render_folder(output, tree, *child, &child_prefix(prefix, is_last))?;
    }

    for child in &folder.assets {
        index += 1;
        let is_last = index == total;
        let asset = tree.asset(*child)?;
        push_line(output, prefix, is_last, ASSET, &asset.name);

        let task_prefix = child_prefix(prefix, is_last);
        for (i, task) in asset.tasks.iter().enumerate() {
            let task_is_last = i == asset.tasks.len() - 1;
            push_line(output, &task_prefix, task_is_last, TASK, &tree.task(*task)?.name);
        }
    }

    Ok(())
}

fn push_line(output: &mut String, prefix: &str, is_last: bool, symbol: char, name: &str) {
    let branch = if is_last { "└── " } else { "├── " };
    output.push_str(prefix);
    output.push_str(branch);
    output.push(symbol);
    output.push(' ');
    output.push_str(name);
    output.push('\n');
}

fn child_prefix(prefix: &str, is_last: bool) -> String {
    let continuation = if is_last { "    " } else { "│   " };
    format!("{}{}", prefix, continuation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_render_nested_project() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("project");
        let hero = root.join("chars").join("Hero");
        fs::create_dir_all(hero.join("Modelling")).unwrap();
        fs::create_dir_all(hero.join("Rigging")).unwrap();
        fs::write(hero.join("Hero.sidecar"), "").unwrap();
        fs::create_dir_all(root.join("Rock")).unwrap();
        fs::write(root.join("Rock").join("Rock.sidecar"), "").unwrap();

        let tree = ProjectTree::build(&root).unwrap();
        let output = render_tree(&tree).unwrap();

        let expected = "\
project
├── ▸ chars
│   └── ◆ Hero
│       ├── • Modelling
│       └── • Rigging
└── ◆ Rock
";
        assert_eq!(output, expected);
    }

    #[test]
    fn test_render_empty_project() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("empty");
        fs::create_dir(&root).unwrap();

        let tree = ProjectTree::build(&root).unwrap();
        assert_eq!(render_tree(&tree).unwrap(), "empty\n");
    }
}
