use crate::bodies::{Body, BodyType, ContactEdge, Fixture};
use crate::collision::contact::{is_collidable, needs_swap, Contact, ContactFlags};
use crate::collision::{BroadPhase, ContactFilter};
use crate::core::{Arena, BodyHandle, ContactHandle, ContactListener, FixtureHandle};

/// Creates, updates and destroys contacts as broadphase pairs appear and
/// disappear, and relays touch events to the listener.
pub(crate) struct ContactManager {
    pub broad_phase: BroadPhase<FixtureHandle>,
    pub contacts: Arena<ContactHandle, Contact>,
    pub contact_filter: Option<Box<dyn ContactFilter>>,
    pub contact_listener: Option<Box<dyn ContactListener>>,
}

impl ContactManager {
    /// Creates a manager around an empty broadphase
    pub fn new(broad_phase: BroadPhase<FixtureHandle>) -> Self {
        Self {
            broad_phase,
            contacts: Arena::new(),
            contact_filter: None,
            contact_listener: None,
        }
    }

    /// Turns new broadphase pairs into contacts
    pub fn find_new_contacts(
        &mut self,
        bodies: &mut Arena<BodyHandle, Body>,
        fixtures: &Arena<FixtureHandle, Fixture>,
    ) {
        let mut pairs = Vec::new();
        self.broad_phase.update_pairs(|a, b| pairs.push((a, b)));

        for (fixture_a, fixture_b) in pairs {
            self.add_pair(fixture_a, fixture_b, bodies, fixtures);
        }
    }

    fn add_pair(
        &mut self,
        mut handle_a: FixtureHandle,
        mut handle_b: FixtureHandle,
        bodies: &mut Arena<BodyHandle, Body>,
        fixtures: &Arena<FixtureHandle, Fixture>,
    ) {
        let (Some(mut fixture_a), Some(mut fixture_b)) = (fixtures.get(handle_a), fixtures.get(handle_b)) else {
            return;
        };

        let body_a = fixture_a.body;
        let body_b = fixture_b.body;

        // Are the fixtures on the same body?
        if body_a == body_b {
            return;
        }

        let (Some(a), Some(b)) = (bodies.get(body_a), bodies.get(body_b)) else {
            return;
        };

        // Does a contact already exist?
        let exists = b.contact_edges.iter().any(|edge| {
            edge.other == body_a
                && self.contacts.get(edge.contact).map_or(false, |c| {
                    (c.fixture_a == handle_a && c.fixture_b == handle_b)
                        || (c.fixture_a == handle_b && c.fixture_b == handle_a)
                })
        });
        if exists {
            return;
        }

        // Does a joint override collision? Is at least one body dynamic?
        if !b.should_collide(body_a, a) {
            return;
        }

        // Check user filtering
        if let Some(filter) = &self.contact_filter {
            if !filter.should_collide(fixture_a, fixture_b) {
                return;
            }
        } else if !fixture_a.filter.should_collide(&fixture_b.filter) {
            return;
        }

        let type_a = fixture_a.shape_type();
        let type_b = fixture_b.shape_type();
        if !is_collidable(type_a, type_b) {
            return;
        }
        if needs_swap(type_a, type_b) {
            std::mem::swap(&mut handle_a, &mut handle_b);
            std::mem::swap(&mut fixture_a, &mut fixture_b);
        }

        let contact = Contact::new(handle_a, fixture_a, handle_b, fixture_b);
        let (body_a, body_b) = (contact.body_a, contact.body_b);
        let wake = !fixture_a.is_sensor && !fixture_b.is_sensor;
        let handle = self.contacts.insert(contact);

        // Connect to the bodies
        if let Some(a) = bodies.get_mut(body_a) {
            a.contact_edges.push(ContactEdge { other: body_b, contact: handle });
            if wake {
                a.set_awake(true);
            }
        }
        if let Some(b) = bodies.get_mut(body_b) {
            b.contact_edges.push(ContactEdge { other: body_a, contact: handle });
            if wake {
                b.set_awake(true);
            }
        }
    }

    /// Destroys a contact, reporting the end of touch and waking the bodies
    /// when it was touching
    pub fn destroy(
        &mut self,
        handle: ContactHandle,
        bodies: &mut Arena<BodyHandle, Body>,
        fixtures: &Arena<FixtureHandle, Fixture>,
    ) {
        let Some(contact) = self.contacts.remove(handle) else {
            return;
        };

        if contact.is_touching() {
            if let Some(listener) = self.contact_listener.as_deref_mut() {
                tracing::trace!(fixture_a = ?contact.fixture_a, fixture_b = ?contact.fixture_b, "contact end");
                listener.end_contact(&contact);
            }
        }

        let sensor = [contact.fixture_a, contact.fixture_b]
            .iter()
            .any(|f| fixtures.get(*f).map_or(false, |f| f.is_sensor));
        let wake = contact.manifold.point_count > 0 && !sensor;

        for body in [contact.body_a, contact.body_b] {
            if let Some(b) = bodies.get_mut(body) {
                b.contact_edges.retain(|edge| edge.contact != handle);
                if wake {
                    b.set_awake(true);
                }
            }
        }
    }

    /// Runs the narrow phase on every contact whose bodies are awake,
    /// destroying contacts that are filtered out or whose fat AABBs no
    /// longer overlap.
    pub fn collide(
        &mut self,
        bodies: &mut Arena<BodyHandle, Body>,
        fixtures: &Arena<FixtureHandle, Fixture>,
    ) {
        for handle in self.contacts.handles() {
            let Some(contact) = self.contacts.get(handle) else {
                continue;
            };
            let (handle_a, handle_b) = (contact.fixture_a, contact.fixture_b);
            let (body_a, body_b) = (contact.body_a, contact.body_b);
            let needs_filtering = contact.flags.contains(ContactFlags::FILTER);

            let (Some(fixture_a), Some(fixture_b)) = (fixtures.get(handle_a), fixtures.get(handle_b)) else {
                self.destroy(handle, bodies, fixtures);
                continue;
            };
            let (Some(a), Some(b)) = (bodies.get(body_a), bodies.get(body_b)) else {
                self.destroy(handle, bodies, fixtures);
                continue;
            };

            // Is this contact flagged for filtering?
            if needs_filtering {
                let filtered_out = !b.should_collide(body_a, a)
                    || match &self.contact_filter {
                        Some(filter) => !filter.should_collide(fixture_a, fixture_b),
                        None => !fixture_a.filter.should_collide(&fixture_b.filter),
                    };
                if filtered_out {
                    self.destroy(handle, bodies, fixtures);
                    continue;
                }

                if let Some(c) = self.contacts.get_mut(handle) {
                    c.flags.remove(ContactFlags::FILTER);
                }
            }

            let active_a = a.is_awake() && a.body_type != BodyType::Static;
            let active_b = b.is_awake() && b.body_type != BodyType::Static;

            // At least one body must be awake and it must be dynamic or kinematic
            if !active_a && !active_b {
                continue;
            }

            let overlap = match (fixture_a.proxy, fixture_b.proxy) {
                (Some(pa), Some(pb)) => self.broad_phase.test_overlap(pa.proxy_id, pb.proxy_id),
                _ => false,
            };

            // Here we destroy contacts that cease to overlap in the broadphase
            if !overlap {
                self.destroy(handle, bodies, fixtures);
                continue;
            }

            let xf_a = a.xf;
            let xf_b = b.xf;
            let listener = self.contact_listener.as_deref_mut();
            let wake = match self.contacts.get_mut(handle) {
                Some(c) => c.update(fixture_a, &xf_a, fixture_b, &xf_b, listener),
                None => false,
            };

            if wake {
                for body in [body_a, body_b] {
                    if let Some(b) = bodies.get_mut(body) {
                        b.set_awake(true);
                    }
                }
            }
        }
    }
}
