//! Turning numbers into speakable phrases.

const ONES: [&str; 20] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen",
    "nineteen",
];

const TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

const SCALES: [&str; 7] = [
    "",
    "thousand",
    "million",
    "billion",
    "trillion",
    "quadrillion",
    "quintillion",
];

/// Spoken tokens surrounding the number itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tokens {
    pub minus: &'static str,
    pub equals: &'static str,
}

const ENGLISH: Tokens = Tokens {
    minus: "minus",
    equals: "equals",
};
const PORTUGUESE: Tokens = Tokens {
    minus: "menos",
    equals: "igual a",
};
const SPANISH: Tokens = Tokens {
    minus: "menos",
    equals: "igual a",
};

fn primary_subtag(language_tag: &str) -> String {
    language_tag
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

pub fn tokens_for(language_tag: &str) -> Tokens {
    match primary_subtag(language_tag).as_str() {
        "pt" => PORTUGUESE,
        "es" => SPANISH,
        _ => ENGLISH,
    }
}

fn below_thousand(n: u64, out: &mut Vec<String>) {
    let hundreds = n / 100;
    let rest = n % 100;
    if hundreds > 0 {
        out.push(format!("{} hundred", ONES[hundreds as usize]));
    }
    match rest {
        0 => {}
        1..=19 => out.push(ONES[rest as usize].to_string()),
        _ => {
            let (tens, ones) = (rest / 10, rest % 10);
            if ones == 0 {
                out.push(TENS[tens as usize].to_string());
            } else {
                out.push(format!("{}-{}", TENS[tens as usize], ONES[ones as usize]));
            }
        }
    }
}

/// US English words for a magnitude, e.g. `1234` → "one thousand two hundred thirty-four".
pub fn english_words(n: u64) -> String {
    if n == 0 {
        return ONES[0].to_string();
    }

    let mut groups = Vec::new();
    let mut rest = n;
    while rest > 0 {
        groups.push(rest % 1000);
        rest /= 1000;
    }

    let mut out = Vec::new();
    for (scale, &group) in groups.iter().enumerate().rev() {
        if group == 0 {
            continue;
        }
        below_thousand(group, &mut out);
        if scale > 0 {
            out.push(SCALES[scale].to_string());
        }
    }
    out.join(" ")
}

/// Spoken form of `value`. English tags get full words; other locales
/// read the digit string and let the voice pronounce it.
pub fn spoken_number(value: i64, language_tag: &str) -> String {
    let magnitude = value.unsigned_abs();
    if primary_subtag(language_tag) == "en" {
        english_words(magnitude)
    } else {
        magnitude.to_string()
    }
}

/// Full phrase for one narration: optional "equals", optional "minus", number.
pub fn phrase(value: i64, is_result: bool, language_tag: &str) -> String {
    let tokens = tokens_for(language_tag);
    let mut parts = Vec::with_capacity(3);
    if is_result {
        parts.push(tokens.equals.to_string());
    }
    if value < 0 {
        parts.push(tokens.minus.to_string());
    }
    parts.push(spoken_number(value, language_tag));
    parts.join(" ")
}
