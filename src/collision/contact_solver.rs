use crate::bodies::{Body, Fixture};
use crate::collision::manifold::{ManifoldType, WorldManifold};
use crate::collision::Contact;
use crate::core::config::{SimulationConfig, MAX_MANIFOLD_POINTS};
use crate::core::time_step::{Position, Velocity};
use crate::core::{Arena, BodyHandle, ContactHandle, ContactImpulse, FixtureHandle, TimeStep};
use crate::math::{Vec2, Mat22, Rot, Transform};

/// Ill-conditioned two-point blocks fall back to a single point
const MAX_CONDITION_NUMBER: f32 = 1000.0;

#[derive(Debug, Clone, Copy, Default)]
struct VelocityConstraintPoint {
    r_a: Vec2,
    r_b: Vec2,
    normal_impulse: f32,
    tangent_impulse: f32,
    normal_mass: f32,
    tangent_mass: f32,
    velocity_bias: f32,
}

#[derive(Debug, Clone, Copy, Default)]
struct ContactVelocityConstraint {
    points: [VelocityConstraintPoint; MAX_MANIFOLD_POINTS],
    normal: Vec2,
    normal_mass: Mat22,
    k: Mat22,
    index_a: usize,
    index_b: usize,
    inv_mass_a: f32,
    inv_mass_b: f32,
    inv_i_a: f32,
    inv_i_b: f32,
    friction: f32,
    restitution: f32,
    tangent_speed: f32,
    point_count: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct ContactPositionConstraint {
    local_points: [Vec2; MAX_MANIFOLD_POINTS],
    local_normal: Vec2,
    local_point: Vec2,
    index_a: usize,
    index_b: usize,
    inv_mass_a: f32,
    inv_mass_b: f32,
    local_center_a: Vec2,
    local_center_b: Vec2,
    inv_i_a: f32,
    inv_i_b: f32,
    kind: ManifoldType,
    radius_a: f32,
    radius_b: f32,
    point_count: usize,
}

/// Separation data for one manifold point at the current solver positions
struct PositionSolverManifold {
    normal: Vec2,
    point: Vec2,
    separation: f32,
}

impl PositionSolverManifold {
    fn new(pc: &ContactPositionConstraint, xf_a: &Transform, xf_b: &Transform, index: usize) -> Self {
        match pc.kind {
            ManifoldType::Circles => {
                let point_a = xf_a.apply(pc.local_point);
                let point_b = xf_b.apply(pc.local_points[0]);
                let normal = (point_b - point_a).normalize();
                Self {
                    normal,
                    point: (point_a + point_b) * 0.5,
                    separation: (point_b - point_a).dot(&normal) - pc.radius_a - pc.radius_b,
                }
            }
            ManifoldType::FaceA => {
                let normal = xf_a.q.rotate(pc.local_normal);
                let plane_point = xf_a.apply(pc.local_point);
                let clip_point = xf_b.apply(pc.local_points[index]);
                Self {
                    normal,
                    point: clip_point,
                    separation: (clip_point - plane_point).dot(&normal) - pc.radius_a - pc.radius_b,
                }
            }
            ManifoldType::FaceB => {
                let normal = xf_b.q.rotate(pc.local_normal);
                let plane_point = xf_b.apply(pc.local_point);
                let clip_point = xf_a.apply(pc.local_points[index]);
                Self {
                    // Ensure normal points from A to B
                    normal: -normal,
                    point: clip_point,
                    separation: (clip_point - plane_point).dot(&normal) - pc.radius_a - pc.radius_b,
                }
            }
        }
    }
}

/// Sequential impulse solver for the touching contacts of one island
pub(crate) struct ContactSolver {
    handles: Vec<ContactHandle>,
    velocity_constraints: Vec<ContactVelocityConstraint>,
    position_constraints: Vec<ContactPositionConstraint>,
}

impl ContactSolver {
    /// Builds constraints for the given contacts. Bodies must already carry
    /// their island indices.
    pub fn new(
        step: TimeStep,
        handles: &[ContactHandle],
        contacts: &Arena<ContactHandle, Contact>,
        bodies: &Arena<BodyHandle, Body>,
        fixtures: &Arena<FixtureHandle, Fixture>,
    ) -> Self {
        let mut solver = Self {
            handles: Vec::with_capacity(handles.len()),
            velocity_constraints: Vec::with_capacity(handles.len()),
            position_constraints: Vec::with_capacity(handles.len()),
        };

        for &handle in handles {
            let Some(contact) = contacts.get(handle) else {
                continue;
            };
            let (Some(fixture_a), Some(fixture_b)) = (fixtures.get(contact.fixture_a), fixtures.get(contact.fixture_b)) else {
                continue;
            };
            let (Some(body_a), Some(body_b)) = (bodies.get(contact.body_a), bodies.get(contact.body_b)) else {
                continue;
            };

            let manifold = &contact.manifold;
            let point_count = manifold.point_count;
            if point_count == 0 {
                continue;
            }

            let mut vc = ContactVelocityConstraint {
                friction: contact.friction,
                restitution: contact.restitution,
                tangent_speed: contact.tangent_speed,
                index_a: body_a.island_index,
                index_b: body_b.island_index,
                inv_mass_a: body_a.inv_mass,
                inv_mass_b: body_b.inv_mass,
                inv_i_a: body_a.inv_inertia,
                inv_i_b: body_b.inv_inertia,
                point_count,
                ..Default::default()
            };

            let mut pc = ContactPositionConstraint {
                index_a: body_a.island_index,
                index_b: body_b.island_index,
                inv_mass_a: body_a.inv_mass,
                inv_mass_b: body_b.inv_mass,
                local_center_a: body_a.sweep.local_center,
                local_center_b: body_b.sweep.local_center,
                inv_i_a: body_a.inv_inertia,
                inv_i_b: body_b.inv_inertia,
                local_normal: manifold.local_normal,
                local_point: manifold.local_point,
                point_count,
                radius_a: fixture_a.shape.radius(),
                radius_b: fixture_b.shape.radius(),
                kind: manifold.kind,
                ..Default::default()
            };

            for (j, cp) in manifold.points().iter().enumerate() {
                let vcp = &mut vc.points[j];
                if step.warm_starting {
                    vcp.normal_impulse = step.dt_ratio * cp.normal_impulse;
                    vcp.tangent_impulse = step.dt_ratio * cp.tangent_impulse;
                }
                pc.local_points[j] = cp.local_point;
            }

            solver.handles.push(handle);
            solver.velocity_constraints.push(vc);
            solver.position_constraints.push(pc);
        }

        solver
    }

    /// Computes anchors, effective masses and restitution bias
    pub fn initialize_velocity_constraints(
        &mut self,
        contacts: &Arena<ContactHandle, Contact>,
        positions: &[Position],
        velocities: &[Velocity],
        config: &SimulationConfig,
    ) {
        for ((vc, pc), handle) in self
            .velocity_constraints
            .iter_mut()
            .zip(&self.position_constraints)
            .zip(&self.handles)
        {
            let Some(contact) = contacts.get(*handle) else {
                continue;
            };

            let (m_a, m_b, i_a, i_b) = (vc.inv_mass_a, vc.inv_mass_b, vc.inv_i_a, vc.inv_i_b);

            let c_a = positions[vc.index_a].c;
            let a_a = positions[vc.index_a].a;
            let v_a = velocities[vc.index_a].v;
            let w_a = velocities[vc.index_a].w;

            let c_b = positions[vc.index_b].c;
            let a_b = positions[vc.index_b].a;
            let v_b = velocities[vc.index_b].v;
            let w_b = velocities[vc.index_b].w;

            let q_a = Rot::new(a_a);
            let q_b = Rot::new(a_b);
            let xf_a = Transform::new(c_a - q_a.rotate(pc.local_center_a), q_a);
            let xf_b = Transform::new(c_b - q_b.rotate(pc.local_center_b), q_b);

            let world_manifold = WorldManifold::new(&contact.manifold, &xf_a, pc.radius_a, &xf_b, pc.radius_b);

            vc.normal = world_manifold.normal;
            let tangent = vc.normal.cross_scalar(1.0);

            for j in 0..vc.point_count {
                let vcp = &mut vc.points[j];

                vcp.r_a = world_manifold.points[j] - c_a;
                vcp.r_b = world_manifold.points[j] - c_b;

                let rn_a = vcp.r_a.cross(&vc.normal);
                let rn_b = vcp.r_b.cross(&vc.normal);
                let k_normal = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;
                vcp.normal_mass = if k_normal > 0.0 { 1.0 / k_normal } else { 0.0 };

                let rt_a = vcp.r_a.cross(&tangent);
                let rt_b = vcp.r_b.cross(&tangent);
                let k_tangent = m_a + m_b + i_a * rt_a * rt_a + i_b * rt_b * rt_b;
                vcp.tangent_mass = if k_tangent > 0.0 { 1.0 / k_tangent } else { 0.0 };

                // Setup a velocity bias for restitution
                vcp.velocity_bias = 0.0;
                let v_rel = vc.normal.dot(
                    &(v_b + Vec2::scalar_cross(w_b, vcp.r_b) - v_a - Vec2::scalar_cross(w_a, vcp.r_a)),
                );
                if v_rel < -config.velocity_threshold {
                    vcp.velocity_bias = -vc.restitution * v_rel;
                }
            }

            // If we have two points, then prepare the block solver
            if vc.point_count == 2 {
                let vcp1 = vc.points[0];
                let vcp2 = vc.points[1];

                let rn1_a = vcp1.r_a.cross(&vc.normal);
                let rn1_b = vcp1.r_b.cross(&vc.normal);
                let rn2_a = vcp2.r_a.cross(&vc.normal);
                let rn2_b = vcp2.r_b.cross(&vc.normal);

                let k11 = m_a + m_b + i_a * rn1_a * rn1_a + i_b * rn1_b * rn1_b;
                let k22 = m_a + m_b + i_a * rn2_a * rn2_a + i_b * rn2_b * rn2_b;
                let k12 = m_a + m_b + i_a * rn1_a * rn2_a + i_b * rn1_b * rn2_b;

                if k11 * k11 < MAX_CONDITION_NUMBER * (k11 * k22 - k12 * k12) {
                    // K is safe to invert
                    vc.k = Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22));
                    vc.normal_mass = vc.k.inverse();
                } else {
                    // The constraints are redundant, just use one
                    vc.point_count = 1;
                }
            }
        }
    }

    /// Applies the impulses carried over from the previous step
    pub fn warm_start(&self, velocities: &mut [Velocity]) {
        for vc in &self.velocity_constraints {
            let (m_a, m_b, i_a, i_b) = (vc.inv_mass_a, vc.inv_mass_b, vc.inv_i_a, vc.inv_i_b);

            let mut v_a = velocities[vc.index_a].v;
            let mut w_a = velocities[vc.index_a].w;
            let mut v_b = velocities[vc.index_b].v;
            let mut w_b = velocities[vc.index_b].w;

            let normal = vc.normal;
            let tangent = normal.cross_scalar(1.0);

            for vcp in &vc.points[..vc.point_count] {
                let p = normal * vcp.normal_impulse + tangent * vcp.tangent_impulse;
                w_a -= i_a * vcp.r_a.cross(&p);
                v_a -= p * m_a;
                w_b += i_b * vcp.r_b.cross(&p);
                v_b += p * m_b;
            }

            velocities[vc.index_a] = Velocity { v: v_a, w: w_a };
            velocities[vc.index_b] = Velocity { v: v_b, w: w_b };
        }
    }

    /// One Gauss-Seidel pass over friction and non-penetration
    pub fn solve_velocity_constraints(&mut self, velocities: &mut [Velocity]) {
        for vc in &mut self.velocity_constraints {
            let (m_a, m_b, i_a, i_b) = (vc.inv_mass_a, vc.inv_mass_b, vc.inv_i_a, vc.inv_i_b);

            let mut v_a = velocities[vc.index_a].v;
            let mut w_a = velocities[vc.index_a].w;
            let mut v_b = velocities[vc.index_b].v;
            let mut w_b = velocities[vc.index_b].w;

            let normal = vc.normal;
            let tangent = normal.cross_scalar(1.0);
            let friction = vc.friction;

            // Solve tangent constraints first because non-penetration is
            // more important than friction.
            for vcp in &mut vc.points[..vc.point_count] {
                // Relative velocity at contact
                let dv = v_b + Vec2::scalar_cross(w_b, vcp.r_b) - v_a - Vec2::scalar_cross(w_a, vcp.r_a);

                // Compute tangent force
                let vt = dv.dot(&tangent) - vc.tangent_speed;
                let lambda = vcp.tangent_mass * (-vt);

                // Clamp the accumulated force
                let max_friction = friction * vcp.normal_impulse;
                let new_impulse = (vcp.tangent_impulse + lambda).clamp(-max_friction, max_friction);
                let lambda = new_impulse - vcp.tangent_impulse;
                vcp.tangent_impulse = new_impulse;

                // Apply contact impulse
                let p = tangent * lambda;
                v_a -= p * m_a;
                w_a -= i_a * vcp.r_a.cross(&p);
                v_b += p * m_b;
                w_b += i_b * vcp.r_b.cross(&p);
            }

            if vc.point_count == 1 {
                let vcp = &mut vc.points[0];

                // Relative velocity at contact
                let dv = v_b + Vec2::scalar_cross(w_b, vcp.r_b) - v_a - Vec2::scalar_cross(w_a, vcp.r_a);

                // Compute normal impulse
                let vn = dv.dot(&normal);
                let lambda = -vcp.normal_mass * (vn - vcp.velocity_bias);

                // Clamp the accumulated impulse
                let new_impulse = (vcp.normal_impulse + lambda).max(0.0);
                let lambda = new_impulse - vcp.normal_impulse;
                vcp.normal_impulse = new_impulse;

                // Apply contact impulse
                let p = normal * lambda;
                v_a -= p * m_a;
                w_a -= i_a * vcp.r_a.cross(&p);
                v_b += p * m_b;
                w_b += i_b * vcp.r_b.cross(&p);
            } else {
                // Block solver developed in collaboration with Dirk Gregorius.
                //
                // Solves the 2x2 linear complementarity problem
                //   vn = A * x + b, vn >= 0, x >= 0, vn_i * x_i = 0
                // by enumerating the four cases, using the incremental
                // formulation x = a + d so that the accumulated impulse
                // stays clamped.
                let (cp1, cp2) = (vc.points[0], vc.points[1]);
                let a = Vec2::new(cp1.normal_impulse, cp2.normal_impulse);

                // Relative velocity at contact
                let dv1 = v_b + Vec2::scalar_cross(w_b, cp1.r_b) - v_a - Vec2::scalar_cross(w_a, cp1.r_a);
                let dv2 = v_b + Vec2::scalar_cross(w_b, cp2.r_b) - v_a - Vec2::scalar_cross(w_a, cp2.r_a);

                // Compute normal velocity
                let vn1 = dv1.dot(&normal);
                let vn2 = dv2.dot(&normal);

                let mut b = Vec2::new(vn1 - cp1.velocity_bias, vn2 - cp2.velocity_bias);

                // Compute b'
                b -= vc.k.mul_vec(a);

                let mut apply = |x: Vec2| {
                    let d = x - a;
                    let p1 = normal * d.x;
                    let p2 = normal * d.y;
                    v_a -= (p1 + p2) * m_a;
                    w_a -= i_a * (cp1.r_a.cross(&p1) + cp2.r_a.cross(&p2));
                    v_b += (p1 + p2) * m_b;
                    w_b += i_b * (cp1.r_b.cross(&p1) + cp2.r_b.cross(&p2));
                    x
                };

                let solved = 'block: {
                    // Case 1: vn = 0, both constraints active
                    let x = -vc.normal_mass.mul_vec(b);
                    if x.x >= 0.0 && x.y >= 0.0 {
                        break 'block Some(apply(x));
                    }

                    // Case 2: vn1 = 0 and x2 = 0
                    let x = Vec2::new(-cp1.normal_mass * b.x, 0.0);
                    let vn2 = vc.k.ex.y * x.x + b.y;
                    if x.x >= 0.0 && vn2 >= 0.0 {
                        break 'block Some(apply(x));
                    }

                    // Case 3: vn2 = 0 and x1 = 0
                    let x = Vec2::new(0.0, -cp2.normal_mass * b.y);
                    let vn1 = vc.k.ey.x * x.y + b.x;
                    if x.y >= 0.0 && vn1 >= 0.0 {
                        break 'block Some(apply(x));
                    }

                    // Case 4: x = 0
                    let x = Vec2::zero();
                    if b.x >= 0.0 && b.y >= 0.0 {
                        break 'block Some(apply(x));
                    }

                    // No solution, give up. This is hit sometimes, but it
                    // doesn't seem to matter.
                    None
                };

                if let Some(x) = solved {
                    vc.points[0].normal_impulse = x.x;
                    vc.points[1].normal_impulse = x.y;
                }
            }

            velocities[vc.index_a] = Velocity { v: v_a, w: w_a };
            velocities[vc.index_b] = Velocity { v: v_b, w: w_b };
        }
    }

    /// Copies the accumulated impulses back into the contact manifolds
    pub fn store_impulses(&self, contacts: &mut Arena<ContactHandle, Contact>) {
        for (vc, handle) in self.velocity_constraints.iter().zip(&self.handles) {
            if let Some(contact) = contacts.get_mut(*handle) {
                for (j, vcp) in vc.points.iter().enumerate().take(contact.manifold.point_count) {
                    contact.manifold.points[j].normal_impulse = vcp.normal_impulse;
                    contact.manifold.points[j].tangent_impulse = vcp.tangent_impulse;
                }
            }
        }
    }

    /// One pass of non-linear Gauss-Seidel position correction. Returns
    /// true when the worst overlap is within tolerance.
    pub fn solve_position_constraints(&self, positions: &mut [Position], config: &SimulationConfig) -> bool {
        let mut min_separation = 0.0f32;

        for pc in &self.position_constraints {
            let (m_a, i_a) = (pc.inv_mass_a, pc.inv_i_a);
            let (m_b, i_b) = (pc.inv_mass_b, pc.inv_i_b);

            let mut c_a = positions[pc.index_a].c;
            let mut a_a = positions[pc.index_a].a;
            let mut c_b = positions[pc.index_b].c;
            let mut a_b = positions[pc.index_b].a;

            // Solve normal constraints
            for j in 0..pc.point_count {
                let q_a = Rot::new(a_a);
                let q_b = Rot::new(a_b);
                let xf_a = Transform::new(c_a - q_a.rotate(pc.local_center_a), q_a);
                let xf_b = Transform::new(c_b - q_b.rotate(pc.local_center_b), q_b);

                let psm = PositionSolverManifold::new(pc, &xf_a, &xf_b, j);
                let normal = psm.normal;

                let r_a = psm.point - c_a;
                let r_b = psm.point - c_b;

                // Track max constraint error
                min_separation = min_separation.min(psm.separation);

                // Prevent large corrections and allow slop
                let c = (config.baumgarte * (psm.separation + config.linear_slop))
                    .clamp(-config.max_linear_correction, 0.0);

                // Compute the effective mass
                let rn_a = r_a.cross(&normal);
                let rn_b = r_b.cross(&normal);
                let k = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;

                // Compute normal impulse
                let impulse = if k > 0.0 { -c / k } else { 0.0 };
                let p = normal * impulse;

                c_a -= p * m_a;
                a_a -= i_a * r_a.cross(&p);
                c_b += p * m_b;
                a_b += i_b * r_b.cross(&p);
            }

            positions[pc.index_a] = Position { c: c_a, a: a_a };
            positions[pc.index_b] = Position { c: c_b, a: a_b };
        }

        // We can't expect min_separation >= -linear_slop because we don't
        // push the separation above -linear_slop.
        min_separation >= -3.0 * config.linear_slop
    }

    /// Contact handles and impulses, in constraint order, for `post_solve`
    pub fn impulses(&self) -> impl Iterator<Item = (ContactHandle, ContactImpulse)> + '_ {
        self.velocity_constraints.iter().zip(&self.handles).map(|(vc, handle)| {
            let mut impulse = ContactImpulse { count: vc.point_count, ..Default::default() };
            for (j, vcp) in vc.points[..vc.point_count].iter().enumerate() {
                impulse.normal_impulses[j] = vcp.normal_impulse;
                impulse.tangent_impulses[j] = vcp.tangent_impulse;
            }
            (*handle, impulse)
        })
    }
}
