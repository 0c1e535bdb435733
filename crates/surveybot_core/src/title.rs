/// A proposal page title split below the survey root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalTitle {
    pub full_title: String,
    pub category: String,
    pub proposal: String,
}

/// Split `<root>/<category>/<proposal>` into its parts. The proposal keeps any
/// further `/` segments. Returns `None` for the root page, a category page, or
/// titles outside the root.
pub fn parse_proposal_title(root: &str, title: &str) -> Option<ProposalTitle> {
    let title = normalize_title(title);
    let below_root = title.strip_prefix(root)?.strip_prefix('/')?;
    let (category, proposal) = below_root.split_once('/')?;
    if category.is_empty() || proposal.is_empty() {
        return None;
    }
    Some(ProposalTitle {
        full_title: title.clone(),
        category: category.to_string(),
        proposal: proposal.to_string(),
    })
}

/// Event feeds and the API both use spaces; underscores only show up in
/// hand-written input.
pub fn normalize_title(title: &str) -> String {
    title.replace('_', " ").trim().to_string()
}
