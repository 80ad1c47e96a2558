//! Connectivity pass: matches coincident segment ends, attaches wires to
//! patches and snaps every junction to a single point.

use crate::constants::CONNECTION_TOLERANCE;
use crate::errors::{NecError, Result};
use crate::math::{Scalar, R3};

use super::{Connection, Patch, Segment, SegmentEnd};

pub(super) struct ConnectSummary {
    pub max_junction: usize,
    pub multi_junctions: usize,
}

fn l1(a: &R3, b: &R3) -> Scalar {
    (a - b).abs().sum()
}

/// Finds the first other segment (searching cyclically after `i`) with an end
/// within `slen` of `p`; the neighbour's start is tested before its end.
fn find_neighbour(segments: &[Segment], i: usize, p: &R3, slen: Scalar) -> Connection {
    let n = segments.len();
    for step in 1..n {
        let ic = (i + step) % n;
        if l1(p, &segments[ic].start) <= slen {
            return Connection::Segment {
                index: ic,
                end: SegmentEnd::Start,
            };
        }
        if l1(p, &segments[ic].end) <= slen {
            return Connection::Segment {
                index: ic,
                end: SegmentEnd::End,
            };
        }
    }
    Connection::Free
}

fn connect_segments(segments: &mut [Segment], ground: bool) -> Result<()> {
    for i in 0..segments.len() {
        segments[i].connections = [Connection::Free; 2];
        let slen = (segments[i].end - segments[i].start).norm() * CONNECTION_TOLERANCE;
        let p1 = segments[i].start;
        let p2 = segments[i].end;

        let mut start_grounded = false;
        if ground {
            if p1.z <= -slen {
                return Err(NecError::Geometry(format!(
                    "segment {} extends below ground",
                    i + 1
                )));
            }
            if p1.z <= slen {
                segments[i].connections[0] = Connection::Ground;
                segments[i].start.z = 0.0;
                start_grounded = true;
            }
        }
        if !start_grounded {
            segments[i].connections[0] = find_neighbour(segments, i, &p1, slen);
        }

        if ground {
            if p2.z <= -slen {
                return Err(NecError::Geometry(format!(
                    "segment {} extends below ground",
                    i + 1
                )));
            }
            if p2.z <= slen {
                if start_grounded {
                    return Err(NecError::Geometry(format!(
                        "segment {} lies in ground plane",
                        i + 1
                    )));
                }
                segments[i].connections[1] = Connection::Ground;
                segments[i].end.z = 0.0;
                continue;
            }
        }
        segments[i].connections[1] = find_neighbour(segments, i, &p2, slen);
    }
    Ok(())
}

/// Replaces patch `index` by four quarter patches at `index..index + 4`.
pub(crate) fn subdivide_patch(patches: &mut Vec<Patch>, index: usize) {
    let parent = patches[index].clone();
    let area = parent.area / 4.0;
    let offset = area.sqrt() / 2.0;
    let children: Vec<Patch> = [(1.0, 1.0), (-1.0, 1.0), (-1.0, -1.0), (1.0, -1.0)]
        .iter()
        .map(|&(sx, sy)| Patch {
            center: parent.center + sx * offset * parent.t1 + sy * offset * parent.t2,
            area,
            ..parent.clone()
        })
        .collect();
    patches.splice(index..=index, children);
}

fn connect_patches(segments: &mut [Segment], patches: &mut Vec<Patch>) {
    let mut ip = 0;
    while ip < patches.len() {
        let pc = patches[ip].center;
        for seg in segments.iter_mut() {
            let slen = l1(&seg.end, &seg.start) * CONNECTION_TOLERANCE;
            let hit = if l1(&seg.start, &pc) <= slen {
                Some(0)
            } else if l1(&seg.end, &pc) <= slen {
                Some(1)
            } else {
                None
            };
            if let Some(slot) = hit {
                seg.connections[slot] = Connection::Patch(ip);
                subdivide_patch(patches, ip);
                break;
            }
        }
        ip += 1;
    }
}

/// Collects the segment ends meeting the junction at `end` of segment `j`,
/// or `None` when that junction belongs to a lower-numbered segment.
fn junction_chain(segments: &[Segment], j: usize, end: SegmentEnd) -> Option<Vec<(usize, SegmentEnd)>> {
    let mut members = vec![(j, end)];
    let mut next = segments[j].connection(end);
    for _ in 0..segments.len() {
        match next {
            Connection::Segment { index, end: e } => {
                if index == j {
                    break;
                }
                if index < j {
                    return None;
                }
                members.push((index, e));
                next = segments[index].connection(e);
            }
            _ => break,
        }
    }
    Some(members)
}

fn snap_junctions(segments: &mut [Segment]) -> ConnectSummary {
    let mut summary = ConnectSummary {
        max_junction: 1,
        multi_junctions: 0,
    };
    for j in 0..segments.len() {
        for end in SegmentEnd::BOTH {
            match segments[j].connection(end) {
                Connection::Segment { index, .. } if index != j => {}
                _ => continue,
            }
            let Some(members) = junction_chain(segments, j, end) else {
                continue;
            };
            let mean = members
                .iter()
                .fold(R3::zeros(), |acc, &(k, e)| acc + segments[k].point(e))
                / members.len() as Scalar;
            for &(k, e) in &members {
                match e {
                    SegmentEnd::Start => segments[k].start = mean,
                    SegmentEnd::End => segments[k].end = mean,
                }
            }
            summary.max_junction = summary.max_junction.max(members.len());
            if members.len() >= 3 {
                summary.multi_junctions += 1;
            }
        }
    }
    summary
}

/// Resolves every segment end against its neighbours, the ground plane and
/// the patches, subdividing patches that terminate a wire.
pub(super) fn resolve(
    segments: &mut [Segment],
    patches: &mut Vec<Patch>,
    ground: bool,
) -> Result<ConnectSummary> {
    if segments.is_empty() {
        return Ok(ConnectSummary {
            max_junction: 1,
            multi_junctions: 0,
        });
    }
    connect_segments(segments, ground)?;
    if !patches.is_empty() {
        connect_patches(segments, patches);
    }
    Ok(snap_junctions(segments))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::geometry::GeometryBuilder;

    #[test]
    fn straight_wire_links_neighbours() {
        let mut b = GeometryBuilder::new();
        b.wire(1, 3, R3::zeros(), R3::new(0.0, 0.0, 3.0), 0.01, 1.0, 1.0)
            .unwrap();
        let g = b.finish(false).unwrap();
        let s = &g.segments;
        assert_eq!(s[0].connections[0], Connection::Free);
        assert_eq!(
            s[0].connections[1],
            Connection::Segment {
                index: 1,
                end: SegmentEnd::Start
            }
        );
        assert_eq!(
            s[1].connections[0],
            Connection::Segment {
                index: 0,
                end: SegmentEnd::End
            }
        );
        assert_eq!(s[2].connections[1], Connection::Free);
    }

    #[test]
    fn closed_loop_has_no_free_ends() {
        let mut b = GeometryBuilder::new();
        let c = [
            R3::new(0.0, 0.0, 1.0),
            R3::new(1.0, 0.0, 1.0),
            R3::new(1.0, 1.0, 1.0),
            R3::new(0.0, 1.0, 1.0),
        ];
        for k in 0..4 {
            b.wire(1, 2, c[k], c[(k + 1) % 4], 0.001, 1.0, 1.0).unwrap();
        }
        let g = b.finish(false).unwrap();
        for seg in &g.segments {
            for conn in seg.connections {
                assert!(matches!(conn, Connection::Segment { .. }));
            }
        }
        assert_eq!(g.max_junction, 2);
    }

    #[test]
    fn ground_touching_end_is_marked_and_snapped() {
        let mut b = GeometryBuilder::new();
        b.wire(1, 2, R3::new(0.0, 0.0, 1.0e-6), R3::new(0.0, 0.0, 1.0), 0.001, 1.0, 1.0)
            .unwrap();
        let g = b.finish(true).unwrap();
        assert_eq!(g.segments[0].connections[0], Connection::Ground);
        assert_eq!(g.segments[0].start.z, 0.0);
    }

    #[test]
    fn segment_below_ground_is_fatal() {
        let mut b = GeometryBuilder::new();
        b.wire(1, 2, R3::new(0.0, 0.0, -1.0), R3::new(0.0, 0.0, 1.0), 0.001, 1.0, 1.0)
            .unwrap();
        let err = b.finish(true).unwrap_err();
        assert!(err.to_string().contains("below ground"));
    }

    #[test]
    fn horizontal_wire_on_ground_is_fatal() {
        let mut b = GeometryBuilder::new();
        b.wire(1, 1, R3::zeros(), R3::x(), 0.001, 1.0, 1.0).unwrap();
        let err = b.finish(true).unwrap_err();
        assert!(err.to_string().contains("lies in ground plane"));
    }

    #[test]
    fn three_way_junction_is_snapped_to_mean() {
        let mut b = GeometryBuilder::new();
        let hub = R3::new(0.0, 0.0, 1.0);
        b.wire(1, 1, R3::new(-1.0, 0.0, 1.0), hub, 0.001, 1.0, 1.0).unwrap();
        b.wire(2, 1, hub + R3::new(1.0e-5, 0.0, 0.0), R3::new(1.0, 0.0, 1.0), 0.001, 1.0, 1.0)
            .unwrap();
        b.wire(3, 1, hub, R3::new(0.0, 0.0, 2.0), 0.001, 1.0, 1.0).unwrap();
        let g = b.finish(false).unwrap();
        assert_eq!(g.max_junction, 3);
        assert_eq!(g.multi_junctions, 1);
        assert_relative_eq!(g.segments[0].end, g.segments[1].start);
        assert_relative_eq!(g.segments[0].end, g.segments[2].start);
    }

    #[test]
    fn wire_on_patch_subdivides_it() {
        let mut b = GeometryBuilder::new();
        b.rectangular_patch(
            R3::new(-0.5, -0.5, 0.0),
            R3::new(0.5, -0.5, 0.0),
            R3::new(0.5, 0.5, 0.0),
        )
        .unwrap();
        b.wire(1, 2, R3::zeros(), R3::new(0.0, 0.0, 1.0), 0.001, 1.0, 1.0)
            .unwrap();
        let g = b.finish(false).unwrap();
        assert_eq!(g.patches.len(), 4);
        assert_eq!(g.segments[0].connections[0], Connection::Patch(0));
        assert_relative_eq!(g.patches[0].area, 0.25);
        assert_relative_eq!(g.patches[2].center, R3::new(-0.25, -0.25, 0.0));
    }
}
