use std::rc::Rc;

use crate::function::Function;
use crate::values::Values;

/// A named condition that shows or hides its member controls.
#[derive(Debug, Clone)]
pub struct VisibilityGroup {
    group_id: String,
    condition: Rc<dyn Function>,
    visible: bool,
}

impl VisibilityGroup {
    /// Groups start out visible until their condition is first evaluated.
    pub fn new(group_id: impl Into<String>, condition: Rc<dyn Function>) -> Self {
        Self {
            group_id: group_id.into(),
            condition,
            visible: true,
        }
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn condition(&self) -> &dyn Function {
        self.condition.as_ref()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Re-evaluates the condition and overwrites the stored flag.
    pub fn compute_visibility(&mut self, values: &dyn Values) {
        self.visible = self.condition.get_boolean(values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::DialogLibrary;
    use crate::expr::Expr;
    use crate::function::FunctionLibrary;
    use crate::values::SimpleValues;

    #[test]
    fn recomputation_overwrites_flag() {
        let condition = Expr::Equals {
            left: Box::new(Expr::value("A")),
            right: Box::new(Expr::literal("x")),
        }
        .compile(
            &Rc::new(FunctionLibrary::new()),
            &Rc::new(DialogLibrary::new()),
        )
        .expect("compile");
        let mut group = VisibilityGroup::new("G", condition);
        group.compute_visibility(&SimpleValues::new());
        assert!(!group.is_visible());
        let values: SimpleValues = [("A", "x")].into_iter().collect();
        group.compute_visibility(&values);
        assert!(group.is_visible());
    }
}
