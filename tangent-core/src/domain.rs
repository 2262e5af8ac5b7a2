//! The model container.
//!
//! A [`Domain`] holds one [`Registry`] per object kind and the global DOF
//! numbering. It is the only place where tag references between objects
//! are resolved, and it fans the trial/commit/reset protocol out to every
//! active stateful object.
//!
//! Materials and sections registered here are prototypes: elements take
//! private copies at construction, so prototypes never carry analysis
//! state and are not visited by the lifecycle fan-outs.

use crate::element::Element;
use crate::error::{Error, Result};
use crate::load::{Constraint, NodalLoad};
use crate::material::UniaxialMaterial;
use crate::node::Node;
use crate::numberer::{self, Dof, DofMap, NumbererKind};
use crate::object::{combine, DomainObject, StatefulObject};
use crate::recorder::Recorder;
use crate::registry::Registry;
use crate::section::Section;
use crate::types::{ObjectKind, Tag};
use nalgebra::DVector;
use rayon::prelude::*;
use tracing::{debug, error, warn};

#[derive(Debug)]
pub struct Domain {
    nodes: Registry<Node>,
    elements: Registry<Box<dyn Element>>,
    materials: Registry<Box<dyn UniaxialMaterial>>,
    sections: Registry<Box<dyn Section>>,
    loads: Registry<NodalLoad>,
    constraints: Registry<Constraint>,
    recorders: Registry<Box<dyn Recorder>>,
    dof_map: DofMap,
    /// Set when the DOF numbering no longer matches the model.
    modified: bool,
}

impl Default for Domain {
    fn default() -> Self {
        Self::new()
    }
}

impl Domain {
    pub fn new() -> Self {
        Self {
            nodes: Registry::new(ObjectKind::Node),
            elements: Registry::new(ObjectKind::Element),
            materials: Registry::new(ObjectKind::Material),
            sections: Registry::new(ObjectKind::Section),
            loads: Registry::new(ObjectKind::Load),
            constraints: Registry::new(ObjectKind::Constraint),
            recorders: Registry::new(ObjectKind::Recorder),
            dof_map: DofMap::default(),
            modified: true,
        }
    }

    pub fn add_node(&mut self, node: Node) -> Result<()> {
        self.nodes.insert(node)?;
        self.modified = true;
        Ok(())
    }

    pub fn add_element(&mut self, element: impl Element + 'static) -> Result<()> {
        self.elements.insert(Box::new(element))?;
        self.modified = true;
        Ok(())
    }

    pub fn add_material(&mut self, material: impl UniaxialMaterial + 'static) -> Result<()> {
        self.materials.insert(Box::new(material))
    }

    pub fn add_section(&mut self, section: impl Section + 'static) -> Result<()> {
        self.sections.insert(Box::new(section))
    }

    pub fn add_load(&mut self, load: NodalLoad) -> Result<()> {
        self.loads.insert(load)
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<()> {
        self.constraints.insert(constraint)?;
        self.modified = true;
        Ok(())
    }

    pub fn add_recorder(&mut self, recorder: impl Recorder + 'static) -> Result<()> {
        self.recorders.insert(Box::new(recorder))
    }

    pub fn node(&self, tag: Tag) -> Result<&Node> {
        self.nodes.at(tag)
    }

    pub fn element(&self, tag: Tag) -> Result<&dyn Element> {
        self.elements.at(tag).map(|e| e.as_ref())
    }

    pub fn material(&self, tag: Tag) -> Result<&dyn UniaxialMaterial> {
        self.materials.at(tag).map(|m| m.as_ref())
    }

    pub fn section(&self, tag: Tag) -> Result<&dyn Section> {
        self.sections.at(tag).map(|s| s.as_ref())
    }

    pub fn load(&self, tag: Tag) -> Result<&NodalLoad> {
        self.loads.at(tag)
    }

    pub fn constraint(&self, tag: Tag) -> Result<&Constraint> {
        self.constraints.at(tag)
    }

    /// Mutable access to a constraint, e.g. to impose a settlement.
    pub fn constraint_mut(&mut self, tag: Tag) -> Result<&mut Constraint> {
        self.constraints.at_mut(tag)
    }

    pub fn recorder(&self, tag: Tag) -> Result<&dyn Recorder> {
        self.recorders.at(tag).map(|r| r.as_ref())
    }

    pub fn nodes(&self) -> &Registry<Node> {
        &self.nodes
    }

    pub fn elements(&self) -> &Registry<Box<dyn Element>> {
        &self.elements
    }

    pub fn loads(&self) -> &Registry<NodalLoad> {
        &self.loads
    }

    pub fn constraints(&self) -> &Registry<Constraint> {
        &self.constraints
    }

    /// Number of objects of `kind`, active or not.
    pub fn count(&self, kind: ObjectKind) -> usize {
        match kind {
            ObjectKind::Node => self.nodes.size(),
            ObjectKind::Element => self.elements.size(),
            ObjectKind::Material => self.materials.size(),
            ObjectKind::Section => self.sections.size(),
            ObjectKind::Load => self.loads.size(),
            ObjectKind::Constraint => self.constraints.size(),
            ObjectKind::Recorder => self.recorders.size(),
        }
    }

    /// Whether an object of `kind` with `tag` exists and is not disabled.
    pub fn is_active(&self, kind: ObjectKind, tag: Tag) -> bool {
        match kind {
            ObjectKind::Node => self.nodes.is_active(tag),
            ObjectKind::Element => self.elements.is_active(tag),
            ObjectKind::Material => self.materials.is_active(tag),
            ObjectKind::Section => self.sections.is_active(tag),
            ObjectKind::Load => self.loads.is_active(tag),
            ObjectKind::Constraint => self.constraints.is_active(tag),
            ObjectKind::Recorder => self.recorders.is_active(tag),
        }
    }

    /// Exclude an object from analysis without removing it. Returns `false`
    /// if it does not exist.
    pub fn disable(&mut self, kind: ObjectKind, tag: Tag) -> bool {
        let found = match kind {
            ObjectKind::Node => self.nodes.disable(tag),
            ObjectKind::Element => self.elements.disable(tag),
            ObjectKind::Material => self.materials.disable(tag),
            ObjectKind::Section => self.sections.disable(tag),
            ObjectKind::Load => self.loads.disable(tag),
            ObjectKind::Constraint => self.constraints.disable(tag),
            ObjectKind::Recorder => self.recorders.disable(tag),
        };
        self.touch(kind, found);
        found
    }

    /// Return a disabled object to the analysis. Returns `false` if it does
    /// not exist.
    pub fn enable(&mut self, kind: ObjectKind, tag: Tag) -> bool {
        let found = match kind {
            ObjectKind::Node => self.nodes.enable(tag),
            ObjectKind::Element => self.elements.enable(tag),
            ObjectKind::Material => self.materials.enable(tag),
            ObjectKind::Section => self.sections.enable(tag),
            ObjectKind::Load => self.loads.enable(tag),
            ObjectKind::Constraint => self.constraints.enable(tag),
            ObjectKind::Recorder => self.recorders.enable(tag),
        };
        self.touch(kind, found);
        found
    }

    /// Remove an object. Returns `false` if it did not exist.
    pub fn erase(&mut self, kind: ObjectKind, tag: Tag) -> bool {
        let found = match kind {
            ObjectKind::Node => self.nodes.erase(tag),
            ObjectKind::Element => self.elements.erase(tag),
            ObjectKind::Material => self.materials.erase(tag),
            ObjectKind::Section => self.sections.erase(tag),
            ObjectKind::Load => self.loads.erase(tag),
            ObjectKind::Constraint => self.constraints.erase(tag),
            ObjectKind::Recorder => self.recorders.erase(tag),
        };
        self.touch(kind, found);
        found
    }

    /// Reactivate every disabled node, element, constraint, load, material
    /// and section. Returns how many were reactivated.
    ///
    /// Called when an analysis run starts, so an object disabled between
    /// load steps stays out of assembly until the next run. Recorders are
    /// not reactivated: a recorder is only disabled when it cannot record.
    pub fn reactivate(&mut self) -> usize {
        let structural =
            self.nodes.enable_all() + self.elements.enable_all() + self.constraints.enable_all();
        if structural > 0 {
            self.modified = true;
        }
        structural + self.materials.enable_all() + self.sections.enable_all() + self.loads.enable_all()
    }

    fn touch(&mut self, kind: ObjectKind, changed: bool) {
        if changed
            && matches!(
                kind,
                ObjectKind::Node | ObjectKind::Element | ObjectKind::Constraint
            )
        {
            self.modified = true;
        }
    }

    /// Rebuild the active-list cache of every registry that changed.
    pub fn update(&mut self) {
        if self.nodes.is_stale() {
            self.nodes.update();
        }
        if self.elements.is_stale() {
            self.elements.update();
        }
        if self.materials.is_stale() {
            self.materials.update();
        }
        if self.sections.is_stale() {
            self.sections.update();
        }
        if self.loads.is_stale() {
            self.loads.update();
        }
        if self.constraints.is_stale() {
            self.constraints.update();
        }
        if self.recorders.is_stale() {
            self.recorders.update();
        }
    }

    /// Whether nodes, elements or constraints changed since the last
    /// numbering.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn dof_map(&self) -> &DofMap {
        &self.dof_map
    }

    pub fn n_equations(&self) -> usize {
        self.dof_map.n_equations()
    }

    /// Initialize active elements against the node registry and renumber
    /// the DOFs.
    pub fn number_dofs(&mut self, kind: NumbererKind) -> Result<&DofMap> {
        self.initialize_all()?;
        self.dof_map = numberer::number_dofs(&self.nodes, &self.elements, &self.constraints, kind)?;
        self.modified = false;
        debug!(
            equations = self.dof_map.n_equations(),
            nodes = self.nodes.active().len(),
            "numbered DOFs"
        );
        Ok(&self.dof_map)
    }

    /// Copy current constraint values into the DOF map.
    pub fn apply_constraints(&mut self) -> Result<()> {
        self.dof_map.apply_constraints(&self.constraints)
    }

    /// Committed nodal displacements scattered into equation space.
    pub fn committed_displacement(&self) -> Result<DVector<f64>> {
        let mut u = DVector::zeros(self.dof_map.n_equations());
        for node in self.nodes.iter_active() {
            let dofs = self.dof_map.node(node.tag())?;
            for (dof, value) in dofs.iter().zip(node.displacement()) {
                if let Dof::Free(eq) = dof {
                    u[*eq] = *value;
                }
            }
        }
        Ok(u)
    }

    /// Push a trial displacement to every active element and node.
    ///
    /// Element updates run in parallel; each element reads the shared
    /// vector and writes only its own trial state. All objects are visited
    /// and the first failure is returned.
    pub fn update_trial(&mut self, u: &DVector<f64>) -> Result<()> {
        let dof_map = &self.dof_map;
        let mut results: Vec<Result<()>> = self
            .elements
            .par_active_mut()
            .map(|e| {
                let field = dof_map.gather(e.nodes(), u)?;
                e.update_trial(field.as_slice())
            })
            .collect();

        self.nodes.for_each_active_mut(|node| {
            let result = dof_map
                .gather(&[node.tag()], u)
                .and_then(|field| node.update_trial(field.as_slice()));
            results.push(result);
        });
        combine(results)
    }

    /// Resolve node references of every active element and return it to
    /// the `Clean` phase. Material state is kept.
    pub fn initialize_all(&mut self) -> Result<()> {
        self.update();
        let nodes = &self.nodes;
        let results: Vec<Result<()>> = self
            .elements
            .par_active_mut()
            .map(|e| e.initialize(nodes))
            .collect();
        combine(results)
    }

    /// Commit every active element and node.
    pub fn commit_all(&mut self) -> Result<()> {
        self.fan_out(|obj| obj.commit(), |node| node.commit())
    }

    /// Discard the trial state of every active element and node.
    pub fn reset_all(&mut self) -> Result<()> {
        self.fan_out(|obj| obj.reset(), |node| node.reset())
    }

    /// Return every active element and node to its construction-time state.
    pub fn clear_all(&mut self) -> Result<()> {
        self.fan_out(|obj| obj.clear(), |node| node.clear())
    }

    fn fan_out<E, N>(&mut self, mut on_element: E, mut on_node: N) -> Result<()>
    where
        E: FnMut(&mut Box<dyn Element>) -> Result<()>,
        N: FnMut(&mut Node) -> Result<()>,
    {
        let mut results = Vec::new();
        self.elements
            .for_each_active_mut(|e| results.push(on_element(e)));
        self.nodes.for_each_active_mut(|n| results.push(on_node(n)));
        combine(results)
    }

    /// Let every active recorder sample the committed state.
    ///
    /// A recorder whose target was erased is disabled and the analysis
    /// continues. Any other recorder error (a target that cannot provide
    /// the response) also disables it, at error level, since the step is
    /// already committed. Returns the tags of the recorders disabled by
    /// this call.
    pub fn record(&mut self, step: usize, load_factor: f64) -> Vec<Tag> {
        let mut recorders =
            std::mem::replace(&mut self.recorders, Registry::new(ObjectKind::Recorder));

        let mut failed = Vec::new();
        recorders.for_each_active_mut(|recorder| match recorder.record(step, load_factor, self) {
            Ok(()) => {}
            Err(e @ Error::NotFound { .. }) => {
                warn!(recorder = %recorder.tag(), error = %e, "target gone, disabling recorder");
                failed.push(recorder.tag());
            }
            Err(e) => {
                error!(recorder = %recorder.tag(), error = %e, "recorder failed, disabling it");
                failed.push(recorder.tag());
            }
        });

        self.recorders = recorders;
        for &tag in &failed {
            self.disable(ObjectKind::Recorder, tag);
        }
        self.recorders.update();
        failed
    }

    /// Error unless an active node `tag` exists and has DOF `dof`.
    pub fn check_dof(&self, tag: Tag, dof: usize) -> Result<()> {
        let node = self.nodes.at(tag)?;
        if dof >= node.ndf() {
            return Err(Error::Configuration(format!(
                "node {} has {} DOFs, DOF {} requested",
                tag,
                node.ndf(),
                dof
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Truss, ZeroLength};
    use crate::material::{Elastic, StrainLimit};
    use crate::object::Phase;
    use crate::recorder::{ElementRecorder, NodeRecorder};
    use crate::section::{Fiber, FiberSection};
    use crate::types::ResponseKind;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn two_springs() -> Domain {
        let mut domain = Domain::new();
        for (tag, x) in [(1, 0.0), (2, 1.0), (3, 2.0)] {
            domain
                .add_node(Node::new(tag, Vector3::new(x, 0.0, 0.0), 1).unwrap())
                .unwrap();
        }
        domain.add_material(Elastic::new(1, 1000.0).unwrap()).unwrap();
        let mat = domain.material(Tag(1)).unwrap().copy();
        domain
            .add_element(ZeroLength::new(1, [Tag(1), Tag(2)], 0, mat.as_ref()))
            .unwrap();
        domain
            .add_element(ZeroLength::new(2, [Tag(2), Tag(3)], 0, mat.as_ref()))
            .unwrap();
        domain.add_constraint(Constraint::fixed(1, Tag(1), 0)).unwrap();
        domain
    }

    #[test]
    fn test_typed_lookup_not_found() {
        let domain = two_springs();
        assert!(domain.node(Tag(2)).is_ok());
        assert_eq!(
            domain.element(Tag(9)).unwrap_err(),
            Error::NotFound {
                kind: ObjectKind::Element,
                tag: Tag(9)
            }
        );
        assert!(matches!(
            domain.section(Tag(1)),
            Err(Error::NotFound {
                kind: ObjectKind::Section,
                ..
            })
        ));
    }

    #[test]
    fn test_duplicate_tag_rejected() {
        let mut domain = two_springs();
        let err = domain
            .add_node(Node::new(2, Vector3::zeros(), 1).unwrap())
            .unwrap_err();
        assert_eq!(
            err,
            Error::DuplicateTag {
                kind: ObjectKind::Node,
                tag: Tag(2)
            }
        );
        assert_eq!(domain.node(Tag(2)).unwrap().coords().x, 1.0);
    }

    #[test]
    fn test_numbering_eliminates_constraints() {
        let mut domain = two_springs();
        assert!(domain.is_modified());
        let map = domain.number_dofs(NumbererKind::Plain).unwrap();
        assert_eq!(map.n_equations(), 2);
        assert_eq!(map.equation(Tag(1), 0), None);
        assert_eq!(map.equation(Tag(2), 0), Some(0));
        assert_eq!(map.equation(Tag(3), 0), Some(1));
        assert!(!domain.is_modified());

        domain.number_dofs(NumbererKind::ReverseCuthillMcKee).unwrap();
        assert_eq!(domain.n_equations(), 2);
    }

    #[test]
    fn test_disable_element_marks_modified() {
        let mut domain = two_springs();
        domain.number_dofs(NumbererKind::Plain).unwrap();

        assert!(domain.disable(ObjectKind::Element, Tag(2)));
        assert!(domain.is_modified());
        assert!(!domain.is_active(ObjectKind::Element, Tag(2)));
        assert!(domain.element(Tag(2)).is_ok());
        assert_eq!(domain.count(ObjectKind::Element), 2);
        assert!(!domain.disable(ObjectKind::Element, Tag(5)));

        assert_eq!(domain.reactivate(), 1);
        assert!(domain.is_active(ObjectKind::Element, Tag(2)));
        assert!(domain.element(Tag(2)).unwrap().is_active());
    }

    #[test]
    fn test_disabled_node_with_active_element_fails_numbering() {
        let mut domain = two_springs();
        domain.disable(ObjectKind::Node, Tag(3));
        assert!(matches!(
            domain.number_dofs(NumbererKind::Plain),
            Err(Error::NotFound {
                kind: ObjectKind::Node,
                tag: Tag(3)
            })
        ));
        domain.disable(ObjectKind::Element, Tag(2));
        assert_eq!(domain.number_dofs(NumbererKind::Plain).unwrap().n_equations(), 1);
    }

    #[test]
    fn test_update_commit_reset_fan_out() {
        let mut domain = two_springs();
        domain.number_dofs(NumbererKind::Plain).unwrap();
        domain.initialize_all().unwrap();

        let u = DVector::from_vec(vec![0.01, 0.03]);
        domain.update_trial(&u).unwrap();
        assert_eq!(domain.node(Tag(3)).unwrap().trial_displacement(), &[0.03]);
        domain.commit_all().unwrap();

        let spring = domain.element(Tag(2)).unwrap();
        assert_relative_eq!(spring.response(ResponseKind::Force).unwrap()[0], 20.0, epsilon = 1e-10);
        assert_eq!(spring.phase(), Phase::Committed);

        domain.update_trial(&DVector::from_vec(vec![1.0, 1.0])).unwrap();
        domain.reset_all().unwrap();
        domain.reset_all().unwrap();
        assert_eq!(domain.node(Tag(3)).unwrap().trial_displacement(), &[0.03]);
        assert_eq!(domain.committed_displacement().unwrap().as_slice(), &[0.01, 0.03]);

        domain.clear_all().unwrap();
        assert_eq!(domain.node(Tag(3)).unwrap().displacement(), &[0.0]);
    }

    #[test]
    fn test_update_trial_reports_failure_after_visiting_all() {
        let mut domain = Domain::new();
        domain.add_node(Node::new(1, Vector3::zeros(), 1).unwrap()).unwrap();
        domain.add_node(Node::new(2, Vector3::x(), 1).unwrap()).unwrap();
        let elastic = Elastic::new(1, 100.0).unwrap();
        let limited = StrainLimit::new(2, &elastic, -0.01, 0.01).unwrap();
        domain
            .add_element(Truss::new(1, [Tag(1), Tag(2)], &limited, 1.0).unwrap())
            .unwrap();
        domain.add_constraint(Constraint::fixed(1, Tag(1), 0)).unwrap();
        domain.number_dofs(NumbererKind::Plain).unwrap();
        domain.initialize_all().unwrap();

        let err = domain.update_trial(&DVector::from_vec(vec![0.5])).unwrap_err();
        assert!(matches!(err, Error::ConstitutiveFailure { .. }));
        // The node was still visited
        assert_eq!(domain.node(Tag(2)).unwrap().trial_displacement(), &[0.5]);
        domain.reset_all().unwrap();
        assert_eq!(domain.node(Tag(2)).unwrap().trial_displacement(), &[0.0]);
    }

    #[test]
    fn test_record_disables_recorder_of_erased_node() {
        let mut domain = two_springs();
        domain
            .add_recorder(NodeRecorder::new(1, vec![Tag(3)], ResponseKind::Displacement).unwrap())
            .unwrap();
        domain
            .add_recorder(NodeRecorder::new(2, vec![Tag(2)], ResponseKind::Displacement).unwrap())
            .unwrap();
        domain.update();

        assert!(domain.record(1, 1.0).is_empty());
        assert!(domain.erase(ObjectKind::Element, Tag(2)));
        assert!(domain.erase(ObjectKind::Node, Tag(3)));

        assert_eq!(domain.record(2, 2.0), vec![Tag(1)]);
        assert!(!domain.is_active(ObjectKind::Recorder, Tag(1)));
        assert_eq!(domain.recorder(Tag(1)).unwrap().history().len(), 1);
        assert_eq!(domain.recorder(Tag(2)).unwrap().history().len(), 2);

        // A disabled recorder is skipped
        assert!(domain.record(3, 3.0).is_empty());
        assert_eq!(domain.recorder(Tag(1)).unwrap().history().len(), 1);
    }

    #[test]
    fn test_record_disables_recorder_of_unavailable_response() {
        let mut domain = two_springs();
        let steel = Elastic::new(2, 2e5).unwrap();
        let section = FiberSection::new(1, vec![Fiber::new(&steel, 1.0).unwrap()]).unwrap();
        domain
            .add_element(Truss::with_section(3, [Tag(2), Tag(3)], &section))
            .unwrap();
        // Fiber sections carry no single stress
        domain
            .add_recorder(ElementRecorder::new(1, vec![Tag(3)], ResponseKind::Stress).unwrap())
            .unwrap();
        domain
            .add_recorder(ElementRecorder::new(2, vec![Tag(3)], ResponseKind::Force).unwrap())
            .unwrap();
        domain.update();

        assert_eq!(domain.record(1, 1.0), vec![Tag(1)]);
        assert!(!domain.is_active(ObjectKind::Recorder, Tag(1)));
        assert!(domain.recorder(Tag(1)).unwrap().history().is_empty());
        assert_eq!(domain.recorder(Tag(2)).unwrap().history().len(), 1);
    }

    #[test]
    fn test_settlement_flows_into_gather() {
        let mut domain = two_springs();
        domain.number_dofs(NumbererKind::Plain).unwrap();
        domain.constraint_mut(Tag(1)).unwrap().set_value(-0.02).unwrap();
        domain.apply_constraints().unwrap();
        let u = DVector::from_vec(vec![0.0, 0.0]);
        assert_eq!(domain.dof_map().gather(&[Tag(1), Tag(2)], &u).unwrap(), vec![-0.02, 0.0]);
    }

    #[test]
    fn test_check_dof() {
        let domain = two_springs();
        assert!(domain.check_dof(Tag(2), 0).is_ok());
        assert!(matches!(domain.check_dof(Tag(2), 1), Err(Error::Configuration(_))));
        assert!(domain.check_dof(Tag(8), 0).is_err());
    }
}
