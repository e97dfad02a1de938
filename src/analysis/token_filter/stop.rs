//! Stop word removal.
//!
//! Function words carry no intent signal; dropping them before the
//! vectorizer builds n-grams keeps bigrams like "tuition fees" adjacent in
//! "what are the tuition fees".
//!
//! ```
//! use augur::analysis::token::Token;
//! use augur::analysis::token_filter::{StopFilter, TokenFilter};
//!
//! let tokens = vec![Token::new("what", 0), Token::new("is", 1), Token::new("tuition", 2)];
//! let kept = StopFilter::english().filter(tokens).unwrap();
//! assert_eq!(kept.len(), 1);
//! assert_eq!(kept[0].text, "tuition");
//! ```

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use crate::analysis::token::TokenStream;
use crate::analysis::token_filter::TokenFilter;
use crate::error::Result;

const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost",
    "alone", "along", "already", "also", "although", "always", "am", "among", "amongst",
    "amoungst", "amount", "an", "and", "another", "any", "anyhow", "anyone", "anything",
    "anyway", "anywhere", "are", "around", "as", "at", "back", "be", "became", "because",
    "become", "becomes", "becoming", "been", "before", "beforehand", "behind", "being", "below",
    "beside", "besides", "between", "beyond", "bill", "both", "bottom", "but", "by", "call",
    "can", "cannot", "cant", "co", "con", "could", "couldnt", "cry", "de", "describe", "detail",
    "do", "done", "down", "due", "during", "each", "eg", "eight", "either", "eleven", "else",
    "elsewhere", "empty", "enough", "etc", "even", "ever", "every", "everyone", "everything",
    "everywhere", "except", "few", "fifteen", "fifty", "fill", "find", "fire", "first", "five",
    "for", "former", "formerly", "forty", "found", "four", "from", "front", "full", "further",
    "get", "give", "go", "had", "has", "hasnt", "have", "he", "hence", "her", "here",
    "hereafter", "hereby", "herein", "hereupon", "hers", "herself", "him", "himself", "his",
    "how", "however", "hundred", "i", "ie", "if", "in", "inc", "indeed", "interest", "into",
    "is", "it", "its", "itself", "keep", "last", "latter", "latterly", "least", "less", "ltd",
    "made", "many", "may", "me", "meanwhile", "might", "mill", "mine", "more", "moreover",
    "most", "mostly", "move", "much", "must", "my", "myself", "name", "namely", "neither",
    "never", "nevertheless", "next", "nine", "no", "nobody", "none", "noone", "nor", "not",
    "nothing", "now", "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto",
    "or", "other", "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own",
    "part", "per", "perhaps", "please", "put", "rather", "re", "same", "see", "seem", "seemed",
    "seeming", "seems", "serious", "several", "she", "should", "show", "side", "since",
    "sincere", "six", "sixty", "so", "some", "somehow", "someone", "something", "sometime",
    "sometimes", "somewhere", "still", "such", "system", "take", "ten", "than", "that", "the",
    "their", "them", "themselves", "then", "thence", "there", "thereafter", "thereby",
    "therefore", "therein", "thereupon", "these", "they", "thick", "thin", "third", "this",
    "those", "though", "three", "through", "throughout", "thru", "thus", "to", "together",
    "too", "top", "toward", "towards", "twelve", "twenty", "two", "un", "under", "until", "up",
    "upon", "us", "very", "via", "was", "we", "well", "were", "what", "whatever", "when",
    "whence", "whenever", "where", "whereafter", "whereas", "whereby", "wherein", "whereupon",
    "wherever", "whether", "which", "while", "whither", "who", "whoever", "whole", "whom",
    "whose", "why", "will", "with", "within", "without", "would", "yet", "you", "your", "yours",
    "yourself", "yourselves",
];

/// The English stop list, shared by every [`StopFilter::english`].
pub static ENGLISH_STOP_WORD_SET: LazyLock<Arc<HashSet<String>>> = LazyLock::new(|| {
    Arc::new(ENGLISH_STOP_WORDS.iter().map(|w| w.to_string()).collect())
});

/// Drops tokens whose text is in the stop list.
///
/// Matching is exact, so run it after [`LowercaseFilter`](super::LowercaseFilter).
#[derive(Clone, Debug)]
pub struct StopFilter {
    words: Arc<HashSet<String>>,
}

impl StopFilter {
    pub fn english() -> Self {
        StopFilter {
            words: Arc::clone(&ENGLISH_STOP_WORD_SET),
        }
    }

    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StopFilter {
            words: Arc::new(words.into_iter().map(Into::into).collect()),
        }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Default for StopFilter {
    fn default() -> Self {
        Self::english()
    }
}

impl TokenFilter for StopFilter {
    fn filter(&self, mut tokens: TokenStream) -> Result<TokenStream> {
        tokens.retain(|token| !self.words.contains(&token.text));
        Ok(tokens)
    }

    fn name(&self) -> &'static str {
        "stop"
    }
}
