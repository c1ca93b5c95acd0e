//! Destination and public URL of a page.
//!
//! ```text
//! src /about      .html               → dest /about/index .html   url /about/
//! src /feed       .xml                → dest /feed        .xml    url /feed.xml
//! permalink /blog/post-1              → dest /blog/post-1/index .html  url /blog/post-1/
//! permalink /blog/post-1  (no pretty) → dest /blog/post-1 .html   url /blog/post-1.html
//! permalink /rss.xml                  → dest /rss         .xml    url /rss.xml
//! ```
//!
//! Resolution only depends on `dest.path`, `dest.ext`, the permalink and the
//! pretty-URL flag, and running it again on its own output changes nothing.
//! Destinations are normalized and always stay inside the output tree.

use crate::{
    page::{Page, keys},
    utils::path::{basename, ensure_leading_slash, extname, join, normalize},
};
use serde_json::Value;

const INDEX: &str = "index";
const HTML: &str = ".html";

/// Compute `dest.path`, `dest.ext`, `data.url` and `data.slug`.
pub fn resolve_url(page: &mut Page, pretty_urls: bool) {
    let permalink = page
        .data_str(keys::PERMALINK)
        .filter(|p| !p.is_empty())
        .map(str::to_owned);

    let dest = &mut page.dest;
    if let Some(permalink) = permalink {
        let ext = extname(&permalink);
        if ext.is_empty() {
            dest.ext = HTML.into();
            dest.path = if pretty_urls {
                join(&permalink, INDEX)
            } else {
                permalink.trim_end_matches('/').to_owned()
            };
        } else {
            dest.ext = ext.to_owned();
            dest.path = permalink[..permalink.len() - ext.len()].to_owned();
        }
    } else if pretty_urls && dest.ext == HTML && basename(&dest.path) != INDEX {
        dest.path = join(&dest.path, INDEX);
    }

    // `..` can not climb above the output root
    dest.path = normalize(&ensure_leading_slash(&dest.path));

    let is_index = basename(&dest.path) == INDEX;
    let parent = &dest.path[..dest.path.len() - if is_index { INDEX.len() } else { 0 }];

    let url = if is_index && dest.ext == HTML {
        parent.to_owned()
    } else {
        dest.file()
    };
    let slug = if is_index {
        basename(parent).to_owned()
    } else {
        basename(&dest.path).to_owned()
    };

    page.data.insert(keys::URL.into(), Value::String(url));
    page.data.insert(keys::SLUG.into(), Value::String(slug));
}
