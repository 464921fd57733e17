//! Whitespace policies applied by `<?teng format?>` blocks.

/// How whitespace in the enclosed output is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpaceMode {
    /// Pass output through unchanged.
    #[default]
    Noformat,
    /// Drop every whitespace character.
    Nospace,
    /// Collapse each whitespace run to a single space.
    Onespace,
    /// Trim whitespace from both edges of every line.
    Striplines,
    /// Trim line edges and remove the newlines as well.
    Joinlines,
}

impl SpaceMode {
    /// Parse the value of the `space` option. `nowhite` is an alias kept
    /// for compatibility with older templates.
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "noformat" => SpaceMode::Noformat,
            "nospace" | "nowhite" => SpaceMode::Nospace,
            "onespace" => SpaceMode::Onespace,
            "striplines" => SpaceMode::Striplines,
            "joinlines" => SpaceMode::Joinlines,
            _ => return None,
        })
    }

    /// Apply the policy to one write.
    pub fn apply(self, text: &str) -> String {
        match self {
            SpaceMode::Noformat => text.to_owned(),
            SpaceMode::Nospace => text.chars().filter(|c| !c.is_whitespace()).collect(),
            SpaceMode::Onespace => {
                let mut out = String::with_capacity(text.len());
                let mut in_run = false;
                for ch in text.chars() {
                    if ch.is_whitespace() {
                        if !in_run {
                            out.push(' ');
                            in_run = true;
                        }
                    } else {
                        out.push(ch);
                        in_run = false;
                    }
                }
                out
            }
            SpaceMode::Striplines => {
                let mut lines: Vec<&str> = text.split('\n').map(str::trim).collect();
                // a trailing newline stays a trailing newline
                if text.ends_with('\n') {
                    lines.pop();
                    let mut out = lines.join("\n");
                    out.push('\n');
                    out
                } else {
                    lines.join("\n")
                }
            }
            SpaceMode::Joinlines => {
                text.split('\n').map(str::trim).collect::<Vec<_>>().concat()
            }
        }
    }
}
