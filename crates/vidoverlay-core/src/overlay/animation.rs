//! Animation fragments.
//!
//! Each curve becomes either a filter chain applied to the overlay stream (fades, zooms,
//! rotation, pulse) or an offset added to the overlay position at composite time
//! (slides, bounce). A chain can't move the overlay on the base frame, so motion curves
//! live on the composite's coordinates.

use serde::Serialize;

use super::models::AnimationCurve;
use crate::{format_time, TimeSec};

/// Time anchors of one animated overlay, all in base-video seconds
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationTiming {
    pub fade_start: TimeSec,
    pub fade_end: TimeSec,
    /// `None` when the visibility window is unbounded
    pub fade_out_start: Option<TimeSec>,
    pub anim_duration: TimeSec,
}

impl AnimationTiming {
    pub fn new(start: TimeSec, duration: Option<TimeSec>, anim_duration: TimeSec) -> Self {
        Self {
            fade_start: start,
            fade_end: start + anim_duration,
            fade_out_start: duration.map(|d| start + d - anim_duration),
            anim_duration,
        }
    }
}

/// Generated animation, ready for the graph compiler
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum AnimationFragment {
    /// Comma-separated filter chain for the overlay stream
    Filter { chain: String },
    /// Expressions added to the composite's x and y
    Offset {
        dx: Option<String>,
        dy: Option<String>,
    },
}

/// Fragment for `curve` over a window starting at `start`.
///
/// With an unbounded window (`duration == None`) the exit half of a curve is dropped:
/// fade-in-out plays as fade-in, fade-out and zoom-out produce nothing.
pub fn generate(
    curve: AnimationCurve,
    start: TimeSec,
    duration: Option<TimeSec>,
    anim_duration: TimeSec,
) -> Option<AnimationFragment> {
    let timing = AnimationTiming::new(start, duration, anim_duration);
    let fs = format_time(timing.fade_start);
    let fe = format_time(timing.fade_end);
    let ad = format_time(timing.anim_duration);
    let fos = timing.fade_out_start.map(format_time);

    let fade_in = format!("fade=t=in:st={fs}:d={ad}:alpha=1");
    let fade_out = fos
        .as_ref()
        .map(|fos| format!("fade=t=out:st={fos}:d={ad}:alpha=1"));

    let fragment = match curve {
        AnimationCurve::FadeIn => with_alpha(&fade_in),
        AnimationCurve::FadeOut => with_alpha(&fade_out?),
        AnimationCurve::FadeInOut => match fade_out {
            Some(fade_out) => with_alpha(&format!("{fade_in},{fade_out}")),
            None => with_alpha(&fade_in),
        },
        AnimationCurve::SlideLeft => AnimationFragment::Offset {
            dx: Some(format!(
                "if(lt(t,{fe}),overlay_w-overlay_w*(t-{fs})/{ad},0)"
            )),
            dy: None,
        },
        AnimationCurve::SlideRight => AnimationFragment::Offset {
            dx: Some(format!(
                "if(lt(t,{fe}),-overlay_w+overlay_w*(t-{fs})/{ad},0)"
            )),
            dy: None,
        },
        AnimationCurve::SlideUp => AnimationFragment::Offset {
            dx: None,
            dy: Some(format!(
                "if(lt(t,{fe}),overlay_h-overlay_h*(t-{fs})/{ad},0)"
            )),
        },
        AnimationCurve::SlideDown => AnimationFragment::Offset {
            dx: None,
            dy: Some(format!(
                "if(lt(t,{fe}),-overlay_h+overlay_h*(t-{fs})/{ad},0)"
            )),
        },
        AnimationCurve::ZoomIn => scale_by(&format!(
            "if(lt(t,{fe}),clip(0.1+0.9*(t-{fs})/{ad},0.1,1),1)"
        )),
        AnimationCurve::ZoomOut => {
            let fos = fos?;
            scale_by(&format!(
                "if(gt(t,{fos}),clip(1-0.9*(t-{fos})/{ad},0.1,1),1)"
            ))
        }
        AnimationCurve::RotateIn => with_alpha(&format!(
            "rotate=a='if(lt(t,{fe}),2*PI*(t-{fs})/{ad},0)':c=none"
        )),
        AnimationCurve::Bounce => AnimationFragment::Offset {
            dx: None,
            dy: Some(format!(
                "if(lt(t,{fe}),abs(sin(4*PI*(t-{fs})/{ad}))*50,0)"
            )),
        },
        AnimationCurve::Pulse => scale_by(&format!("1+0.2*sin(4*PI*(t-{fs})/{ad})")),
    };

    Some(fragment)
}

/// Alpha-producing filters need a pixel format with an alpha plane
fn with_alpha(chain: &str) -> AnimationFragment {
    AnimationFragment::Filter {
        chain: format!("format=yuva420p,{chain}"),
    }
}

/// Per-frame scale by a time-dependent factor, kept at even dimensions
fn scale_by(factor: &str) -> AnimationFragment {
    AnimationFragment::Filter {
        chain: format!(
            "scale=w='trunc(iw*({factor})/2)*2':h='trunc(ih*({factor})/2)*2':eval=frame"
        ),
    }
}
