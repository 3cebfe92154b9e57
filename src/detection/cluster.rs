//! Tag-co-occurrence clustering: turns the posts of anomalous cells into
//! event records.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use regex::Regex;

use crate::core::{Event, GeoPoint, Post};
use crate::error::{Error, Result};
use crate::index::QuadTree;

/// Transient clustering accumulator: the posts gathered so far and each
/// tag's occurrence count (the number of posts carrying it).
struct EventHolder {
    posts: HashSet<String>,
    tags: HashMap<String, u32>,
}

/// Clusters the posts of anomaly-flagged cells into events.
///
/// Leaves never interact: each candidate cell is clustered independently,
/// and the resulting events are concatenated.
pub struct EventClusterer {
    max_points: u32,
    filter_tags: HashSet<String>,
    hashtag_re: Regex,
    mention_re: Regex,
}

impl EventClusterer {
    pub fn new(max_points: u32, filter_tags: HashSet<String>) -> Result<Self> {
        let hashtag_re = Regex::new(r"#[^\s#\n!.?]+")
            .map_err(|e| Error::Config(format!("hashtag pattern: {}", e)))?;
        let mention_re = Regex::new(r"@[^\s#\n!.?]+")
            .map_err(|e| Error::Config(format!("mention pattern: {}", e)))?;
        Ok(Self { max_points, filter_tags, hashtag_re, mention_re })
    }

    /// Runs one clustering pass over an anomaly-flagged tree for the
    /// window `[start, finish]`. The tree is refined first: every leaf
    /// overflowing against its live-inflated weight is split once more, so
    /// clustering happens at the sharpest spatial resolution available.
    pub fn find_events(&self, tree: &mut QuadTree, start: i64, finish: i64) -> Vec<Event> {
        refine(tree);
        let mut events = Vec::new();
        self.collect(tree, start, finish, &mut events);
        events
    }

    fn collect(&self, node: &QuadTree, start: i64, finish: i64, out: &mut Vec<Event>) {
        match node.quadrants() {
            Some(children) => {
                for child in children {
                    self.collect(child, start, finish, out);
                }
            }
            None => {
                if node.weight() >= self.max_points {
                    out.extend(self.leaf_events(node, start, finish));
                }
            }
        }
    }

    fn leaf_events(&self, leaf: &QuadTree, start: i64, finish: i64) -> Vec<Event> {
        let posts: Vec<&Arc<Post>> =
            leaf.points().iter().filter_map(|p| p.payload.as_ref()).collect();

        // tag -> shortcodes carrying it. Ordered so the greedy pass below
        // is deterministic.
        let mut tag_posts: BTreeMap<String, HashSet<String>> = BTreeMap::new();
        for post in &posts {
            for tag in self.extract_tags(&post.caption) {
                tag_posts.entry(tag).or_default().insert(post.shortcode.clone());
            }
        }

        // Greedy single-pass clustering: a tag's posts merge into the
        // first holder sharing a shortcode; holders that later turn out to
        // overlap transitively are intentionally not re-merged.
        let mut holders: Vec<EventHolder> = Vec::new();
        for (tag, codes) in &tag_posts {
            match holders.iter_mut().find(|h| codes.iter().any(|c| h.posts.contains(c))) {
                Some(holder) => {
                    *holder.tags.entry(tag.clone()).or_insert(0) += codes.len() as u32;
                    holder.posts.extend(codes.iter().cloned());
                }
                None => {
                    let mut tags = HashMap::new();
                    tags.insert(tag.clone(), codes.len() as u32);
                    holders.push(EventHolder { posts: codes.clone(), tags });
                }
            }
        }

        let mut events = Vec::new();
        for holder in holders {
            if (holder.posts.len() as f64) < f64::from(self.max_points) / 2.0 {
                continue;
            }
            // Majority-vote pruning: a tag carried by fewer than half of
            // the holder's posts is noise, not the event's identity.
            let half = holder.posts.len() as f64 / 2.0;
            let mut surviving: Vec<(String, u32)> =
                holder.tags.into_iter().filter(|&(_, count)| f64::from(count) >= half).collect();
            if surviving.is_empty() {
                continue;
            }
            surviving.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

            let mut post_codes: HashSet<String> = HashSet::new();
            for (tag, _) in &surviving {
                if let Some(codes) = tag_posts.get(tag) {
                    post_codes.extend(codes.iter().cloned());
                }
            }
            if post_codes.is_empty() {
                continue;
            }

            let center = event_center(&post_codes, &posts);
            let tags: Vec<String> = surviving.into_iter().map(|(tag, _)| tag).collect();
            let title = tags[0].clone();
            let mut codes: Vec<String> = post_codes.into_iter().collect();
            codes.sort();
            events.push(Event { center, post_codes: codes, tags, title, start, finish });
        }
        events
    }

    /// Hashtags and mentions of one caption: lower-cased, de-duplicated,
    /// with excluded tags dropped.
    fn extract_tags(&self, caption: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut tags = Vec::new();
        for m in self.hashtag_re.find_iter(caption).chain(self.mention_re.find_iter(caption)) {
            let tag = m.as_str().to_lowercase();
            if self.filter_tags.contains(&tag) {
                continue;
            }
            if seen.insert(tag.clone()) {
                tags.push(tag);
            }
        }
        tags
    }
}

/// Splits every leaf that overflows against its live-inflated weight.
fn refine(node: &mut QuadTree) {
    if node.is_leaf() {
        node.check();
        return;
    }
    if let Some(children) = node.quadrants_mut() {
        for child in children {
            refine(child);
        }
    }
}

/// Unweighted average over the distinct coordinates of the final post
/// set; posts sharing a coordinate fold into one point carrying their
/// multiplicity.
fn event_center(codes: &HashSet<String>, posts: &[&Arc<Post>]) -> GeoPoint {
    let mut folded: HashMap<(u64, u64), (f64, f64, u32)> = HashMap::new();
    for post in posts {
        if !codes.contains(&post.shortcode) {
            continue;
        }
        let entry = folded
            .entry((post.lat.to_bits(), post.lon.to_bits()))
            .or_insert((post.lat, post.lon, 0));
        entry.2 += 1;
    }
    let total = codes.len() as f64;
    let mut lat = 0.0;
    let mut lon = 0.0;
    for (_, (p_lat, p_lon, count)) in folded {
        lat += p_lat * f64::from(count) / total;
        lon += p_lon * f64::from(count) / total;
    }
    GeoPoint::new(lat, lon)
}
