//! Value completion for `cliVersion` and `board`.

use serde_json::json;
use sketch_syntax::TextRange;
use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, CompletionItemTag, CompletionTextEdit, Position, Range,
    TextEdit,
};

use crate::document::{ConfigDocument, BOARD, CLI_VERSION};
use crate::external::{Platform, Release};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionTarget {
    ToolchainVersion,
    Board,
}

/// The value being completed and the range the chosen item replaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionSite {
    pub target: CompletionTarget,
    pub range: Range,
}

/// Finds the completable value under `position`, if any.
pub fn completion_site(document: &ConfigDocument, position: Position) -> Option<CompletionSite> {
    let offset = document.offset(position)?;
    let root = document.root()?;
    // A member without a value ends at its key, so the cursor sits past it.
    let member = root.member_at(offset).or_else(|| {
        root.members()
            .iter()
            .rev()
            .find(|member| member.key_range.end() <= offset)
            .filter(|member| member.value.is_none())
    })?;
    if offset < member.key_range.end() {
        return None;
    }
    let target = match member.key.as_str() {
        CLI_VERSION => CompletionTarget::ToolchainVersion,
        BOARD => CompletionTarget::Board,
        _ => return None,
    };
    let range = match &member.value {
        Some(value) if value.as_str().is_some() => value.range,
        Some(_) => return None,
        None => TextRange::empty(offset),
    };
    Some(CompletionSite {
        target,
        range: document.range(range),
    })
}

/// Releases in feed order. Pre-releases are offered but marked deprecated.
pub fn release_items(releases: &[Release], range: Range) -> Vec<CompletionItem> {
    releases
        .iter()
        .filter(|release| !release.name.is_empty())
        .enumerate()
        .map(|(index, release)| {
            let mut item = value_item(&release.name, range, index);
            if release.prerelease {
                item.detail = Some("pre-release".to_string());
                item.tags = Some(vec![CompletionItemTag::DEPRECATED]);
            } else {
                item.detail = Some(release.tag_name.clone());
            }
            item
        })
        .collect()
}

/// Every board of every platform, labelled by name and inserting the FQBN.
pub fn board_items(platforms: &[Platform], range: Range) -> Vec<CompletionItem> {
    platforms
        .iter()
        .flat_map(|platform| platform.boards.iter().map(move |board| (platform, board)))
        .enumerate()
        .map(|(index, (platform, board))| {
            let mut item = value_item(&board.fqbn, range, index);
            item.label = board.name.clone();
            item.detail = Some(platform.id.clone());
            item
        })
        .collect()
}

fn value_item(value: &str, range: Range, index: usize) -> CompletionItem {
    let quoted = json!(value).to_string();
    CompletionItem {
        label: value.to_string(),
        kind: Some(CompletionItemKind::VALUE),
        sort_text: Some(format!("{index:04}")),
        filter_text: Some(quoted.clone()),
        text_edit: Some(CompletionTextEdit::Edit(TextEdit::new(range, quoted))),
        ..Default::default()
    }
}
