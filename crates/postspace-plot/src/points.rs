//! The set of plotted points.
//!
//! Only root posts are plotted, each exactly once, at the coordinates
//! computed when it was created. Replies are part of a thread, not of
//! the map.

use std::collections::HashSet;

use postspace_shared::{Post, PostId};
use serde::Serialize;

use crate::math::{ray_sphere, Ray, Vec3};

/// World-space radius of every point sphere.
pub const POINT_RADIUS: f64 = 0.05;
pub const POINT_SATURATION: f64 = 0.7;
pub const POINT_LIGHTNESS: f64 = 0.5;

/// Linear RGB color, components in `0..=1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    /// `h`, `s` and `l` are all fractions in `0..=1`.
    pub fn from_hsl(h: f64, s: f64, l: f64) -> Self {
        let h = h.rem_euclid(1.0);
        let s = s.clamp(0.0, 1.0);
        let l = l.clamp(0.0, 1.0);

        if s == 0.0 {
            let v = l as f32;
            return Self { r: v, g: v, b: v };
        }

        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;
        Self {
            r: hue_to_rgb(p, q, h + 1.0 / 3.0) as f32,
            g: hue_to_rgb(p, q, h) as f32,
            b: hue_to_rgb(p, q, h - 1.0 / 3.0) as f32,
        }
    }

    /// `0xRRGGBB`.
    pub fn to_hex(self) -> u32 {
        let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u32;
        (c(self.r) << 16) | (c(self.g) << 8) | c(self.b)
    }
}

fn hue_to_rgb(p: f64, q: f64, t: f64) -> f64 {
    let t = t.rem_euclid(1.0);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlotPoint {
    pub post_id: PostId,
    pub position: Vec3,
    pub color: Rgb,
    pub label: String,
}

#[derive(Debug, Clone, Default)]
pub struct PointSet {
    points: Vec<PlotPoint>,
    skipped: usize,
}

impl PointSet {
    /// Build the plotted set from a post collection in the order given.
    ///
    /// Replies are ignored. Root posts without usable coordinates are
    /// skipped and counted in [`PointSet::skipped`]. A post id that
    /// appears more than once is plotted for its first occurrence only.
    pub fn from_posts(posts: &[Post]) -> Self {
        let mut seen = HashSet::new();
        let mut plotted = Vec::new();
        let mut skipped = 0;

        for post in posts.iter().filter(|p| p.is_root()) {
            if !seen.insert(post.id) {
                continue;
            }
            match post.plot_position().filter(|c| c.is_finite()) {
                Some(c) => plotted.push((post, Vec3::from(c))),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            tracing::debug!(skipped, "root posts without coordinates left off the plot");
        }

        let n = plotted.len();
        let points = plotted
            .into_iter()
            .enumerate()
            .map(|(i, (post, position))| PlotPoint {
                post_id: post.id,
                position,
                color: Rgb::from_hsl(i as f64 / n as f64, POINT_SATURATION, POINT_LIGHTNESS),
                label: post.title.clone(),
            })
            .collect();

        Self { points, skipped }
    }

    pub fn points(&self) -> &[PlotPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Root posts that could not be plotted.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn get(&self, id: PostId) -> Option<&PlotPoint> {
        self.points.iter().find(|p| p.post_id == id)
    }

    pub fn contains(&self, id: PostId) -> bool {
        self.get(id).is_some()
    }

    /// The point whose sphere the ray enters first.
    pub fn hit_test(&self, ray: &Ray) -> Option<PostId> {
        self.points
            .iter()
            .filter_map(|p| ray_sphere(ray, p.position, POINT_RADIUS).map(|t| (t, p.post_id)))
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, id)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use postspace_shared::{Coordinates, UserId};
    use uuid::Uuid;

    fn root(x: f64, y: f64, z: f64) -> Post {
        Post {
            id: PostId::new(),
            title: format!("({x},{y},{z})"),
            body: None,
            image_ref: None,
            author_id: UserId(Uuid::new_v4()),
            parent_id: None,
            coordinates: Some(Coordinates::new(x, y, z)),
            created_at: Utc::now(),
        }
    }

    fn reply_to(parent: &Post) -> Post {
        let mut r = root(9.0, 9.0, 9.0);
        r.parent_id = Some(parent.id);
        r.title = String::new();
        r
    }

    #[test]
    fn test_every_root_plotted_once_at_its_coordinates() {
        let a = root(1.0, 2.0, 3.0);
        let b = root(-1.0, 0.0, 0.5);
        let set = PointSet::from_posts(&[a.clone(), b.clone(), a.clone()]);

        assert_eq!(set.len(), 2);
        for post in [&a, &b] {
            let hits: Vec<_> = set.points().iter().filter(|p| p.post_id == post.id).collect();
            assert_eq!(hits.len(), 1);
            assert_eq!(hits[0].position, Vec3::from(post.coordinates.unwrap()));
        }
    }

    #[test]
    fn test_replies_are_never_plotted() {
        let a = root(0.0, 0.0, 0.0);
        let r = reply_to(&a);
        let set = PointSet::from_posts(&[a.clone(), r.clone()]);
        assert!(set.contains(a.id));
        assert!(!set.contains(r.id));
        assert_eq!(set.skipped(), 0);
    }

    #[test]
    fn test_roots_without_coordinates_are_counted() {
        let mut a = root(0.0, 0.0, 0.0);
        a.coordinates = None;
        let mut b = root(0.0, 0.0, 0.0);
        b.coordinates = Some(Coordinates::new(f64::NAN, 0.0, 0.0));
        let c = root(1.0, 1.0, 1.0);

        let set = PointSet::from_posts(&[a, b, c.clone()]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.skipped(), 2);
        assert!(set.contains(c.id));
    }

    #[test]
    fn test_colors_are_deterministic_and_spread() {
        let posts = vec![root(0.0, 0.0, 0.0), root(1.0, 0.0, 0.0), root(2.0, 0.0, 0.0)];
        let first = PointSet::from_posts(&posts);
        let second = PointSet::from_posts(&posts);
        let colors: Vec<Rgb> = first.points().iter().map(|p| p.color).collect();
        assert_eq!(colors, second.points().iter().map(|p| p.color).collect::<Vec<_>>());
        assert_ne!(colors[0], colors[1]);
        assert_ne!(colors[1], colors[2]);
    }

    #[test]
    fn test_hsl_primary_hues() {
        assert_eq!(Rgb::from_hsl(0.0, 1.0, 0.5).to_hex(), 0xff0000);
        assert_eq!(Rgb::from_hsl(1.0 / 3.0, 1.0, 0.5).to_hex(), 0x00ff00);
        assert_eq!(Rgb::from_hsl(2.0 / 3.0, 1.0, 0.5).to_hex(), 0x0000ff);
        assert_eq!(Rgb::from_hsl(0.5, 0.0, 0.5).to_hex(), 0x808080);
    }

    #[test]
    fn test_hit_test_prefers_nearest() {
        let near = root(0.0, 0.0, -1.0);
        let far = root(0.0, 0.0, 1.0);
        let set = PointSet::from_posts(&[far.clone(), near.clone()]);
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(set.hit_test(&ray), Some(near.id));

        let miss = Ray::new(Vec3::new(0.0, 1.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(set.hit_test(&miss), None);
    }
}
