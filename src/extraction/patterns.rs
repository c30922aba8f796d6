//! Process-wide patterns and vocabularies, initialized once and never mutated.

use once_cell::sync::Lazy;
use regex::Regex;

pub const EMAIL_PATTERN: &str = r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}";

pub const PHONE_PATTERN: &str =
    r"(?:\+?\d{1,3}[\s.-]?)?(?:\(\d{2,4}\)|\d{2,4})[\s.-]?\d{3,4}[\s.-]?\d{3,4}";

/// Unanchored probe used by the structural signature
pub static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(EMAIL_PATTERN).expect("valid email regex"));

pub static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(PHONE_PATTERN).expect("valid phone regex"));

/// Whole-value address grammar used by the email validator
pub static EMAIL_EXACT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)*\.[A-Za-z]{2,}$")
        .expect("valid email regex")
});

pub static URL_SCHEME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*:").expect("valid scheme regex"));

pub const PHONE_MIN_DIGITS: usize = 7;
pub const PHONE_MAX_DIGITS: usize = 15;
pub const NAME_MAX_WORDS: usize = 6;
pub const NAME_MAX_WORD_LEN: usize = 25;

/// Interface labels that are never a person's name (compared lower-cased)
pub const NAME_BLACKLIST: &[&str] = &[
    "contact", "email", "phone", "website", "address", "location", "sign in", "log in",
    "sign up", "log out", "register", "login", "get help", "contact us", "about us",
    "view profile", "view all", "learn more", "read more", "see more", "show more",
    "load more", "search", "filter", "back to", "click here", "more info", "details",
    "menu", "home", "about", "services", "resources", "blog", "news", "agent", "broker",
    "team", "group", "partners", "associates", "name", "first name", "last name",
    "full name", "your name", "username", "our team", "staff", "directory", "profile",
];

/// Job-title vocabulary for keyword matching
pub const TITLE_KEYWORDS: &[&str] = &[
    "president", "director", "manager", "partner", "associate", "counsel", "attorney",
    "engineer", "officer", "founder", "head of", "lead", "chief", "analyst", "consultant",
    "coordinator", "specialist", "professor", "assistant", "agent", "broker", "advisor",
    "ceo", "cfo", "cto", "coo", "vp",
];

/// Href fragments marking a person's profile page
pub const PROFILE_URL_FRAGMENTS: &[&str] = &[
    "/people/", "/person/", "/team/", "/staff/", "/profile", "/bio", "/agents/",
    "/attorneys/", "/lawyers/", "/professionals/", "/our-team/", "/directory/",
];

pub const NAME_SELECTOR: &str = "h1, h2, h3, h4, h5, .name, [itemprop=\"name\"], strong";
pub const TITLE_SELECTOR: &str =
    ".title, .position, .role, .job-title, [itemprop=\"jobTitle\"]";
pub const LOCATION_SELECTOR: &str = ".location, .office, .city, address, [itemprop=\"address\"]";

/// Webmail providers; addresses there are classified `personal`
pub const PERSONAL_DOMAINS: &[&str] = &[
    "gmail.com", "yahoo.com", "hotmail.com", "outlook.com", "aol.com", "icloud.com",
    "me.com", "mac.com", "protonmail.com", "mail.com", "yandex.com", "gmx.com", "zoho.com",
    "live.com", "msn.com",
];

/// Mailbox prefixes that carry no personal name
pub const GENERIC_EMAIL_PREFIXES: &[&str] = &[
    "info", "contact", "admin", "support", "help", "sales", "hello", "team", "office", "mail",
    "noreply", "no-reply",
];
