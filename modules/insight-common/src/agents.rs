use crate::types::Author;

/// How an agent is presented in the event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentProfile {
    pub icon: &'static str,
    pub name: String,
}

impl Author {
    pub fn profile(&self) -> AgentProfile {
        let (icon, name) = match self {
            Author::SearchAgent => ("🔍", "Google Search Agent"),
            Author::FetchWebsiteAgent => ("🌐", "Google Analyzer Agent"),
            Author::BigqueryAgent => ("📊", "BigQuery Agent"),
            Author::StatistaAgent => ("📈", "Market Insights Agent"),
            Author::SequentialAgent => ("⚡", "Coordinator"),
            Author::FinalResults => ("✅", "Final Results"),
            Author::System => ("⚠️", "System"),
            Author::Other(raw) => {
                return AgentProfile {
                    icon: "🤖",
                    name: humanize(raw),
                }
            }
        };
        AgentProfile {
            icon,
            name: name.to_string(),
        }
    }
}

/// `market_research_agent` -> `Market Research_agent`: the first underscore
/// becomes a space, then every word start is capitalized.
fn humanize(raw: &str) -> String {
    let spaced = raw.replacen('_', " ", 1);
    let mut out = String::with_capacity(spaced.len());
    let mut at_word_start = true;
    for ch in spaced.chars() {
        let is_word = ch.is_alphanumeric() || ch == '_';
        if is_word && at_word_start {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        at_word_start = !is_word;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_agent_profiles() {
        assert_eq!(Author::SearchAgent.profile().icon, "🔍");
        assert_eq!(Author::FetchWebsiteAgent.profile().name, "Google Analyzer Agent");
        assert_eq!(Author::SequentialAgent.profile().name, "Coordinator");
    }

    #[test]
    fn test_unknown_agent_name_is_humanized() {
        let profile = Author::Other("reddit_agent".into()).profile();
        assert_eq!(profile.icon, "🤖");
        assert_eq!(profile.name, "Reddit Agent");
    }

    #[test]
    fn test_humanize_replaces_only_first_underscore() {
        assert_eq!(humanize("market_research_agent"), "Market Research_agent");
    }
}
