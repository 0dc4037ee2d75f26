use super::{
    expr::Place,
    scope::Category,
    types::{Scalar, Type},
    Context, SemanticError,
};
use crate::{
    ir::{Operand, Operator},
    lex::Identifier,
    parse::{Expr, Passing, Statement},
    source::Located,
};

impl Context {
    pub(super) fn statements(&mut self, statements: &[Statement]) {
        for statement in statements {
            self.statement(statement);
        }
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Assign { target, value } => {
                // El lado izquierdo se resuelve primero
                let (place, target_type) = self.place(target.as_ref());
                let (value_operand, value_type) = self.eval(value);

                match (target_type, value_type) {
                    (Some(target_type), _) if !target_type.is_scalar() => {
                        self.error(SemanticError::AggregateAssignment(target_type), target)
                    }

                    (Some(target_type), Some(value_type)) if target_type != value_type => {
                        self.error(SemanticError::ExpectedType(target_type, value_type), value)
                    }

                    _ => (),
                }

                match place {
                    Place::Direct(name) => {
                        self.emit(Operator::Assign, value_operand, Operand::None, name)
                    }

                    Place::Indirect(address) => self.emit(
                        Operator::Store,
                        value_operand,
                        Operand::None,
                        Operand::Temp(address),
                    ),
                }
            }

            Statement::Call { procedure, args } => self.call(procedure, args),

            Statement::Conditional {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.condition(condition);
                self.emit(Operator::Then, condition, Operand::None, Operand::None);
                self.statements(then);

                self.emit_marker(Operator::Else);
                self.statements(otherwise);
                self.emit_marker(Operator::EndIf);
            }

            Statement::Loop { condition, body } => {
                self.emit_marker(Operator::While);

                let condition = self.condition(condition);
                self.emit(Operator::Do, condition, Operand::None, Operand::None);

                self.statements(body);
                self.emit_marker(Operator::EndWhile);
            }

            Statement::Input(target) => {
                match self.scopes.lookup(target.as_ref().as_ref()).cloned() {
                    Some(symbol) if symbol.category == Category::Procedure => {
                        self.error(SemanticError::ExpectedVar(target.as_ref().clone()), target)
                    }

                    Some(symbol) if !symbol.of.is_arithmetic() => {
                        self.error(SemanticError::ExpectedScalar(symbol.of), target)
                    }

                    Some(_) => (),
                    None => self.error(SemanticError::Undefined(target.as_ref().clone()), target),
                }

                let target = Operand::Name(target.as_ref().name());
                self.emit(Operator::Input, Operand::None, Operand::None, target);
            }

            Statement::Output(value) => {
                let (operand, of) = self.eval(value);
                match of {
                    Some(of) if !of.is_arithmetic() => {
                        self.error(SemanticError::ExpectedScalar(of), value)
                    }

                    _ => (),
                }

                self.emit(Operator::Output, operand, Operand::None, Operand::None);
            }

            // Solo se verifica la expresión, no existe un cuádruplo de retorno
            Statement::Return(value) => {
                let (_, of) = self.eval(value);
                if let Some(of) = of.filter(|of| !of.is_arithmetic()) {
                    self.error(SemanticError::ExpectedScalar(of), value);
                }
            }
        }
    }

    fn condition(&mut self, condition: &Located<Expr>) -> Operand {
        let (operand, of) = self.eval(condition);
        match of {
            Some(Type::Scalar(Scalar::Boolean)) | None => (),
            Some(other) => self.error(SemanticError::ExpectedBoolean(other), condition),
        }

        operand
    }

    /// Llamada a procedimiento.
    ///
    /// Todos los argumentos se evalúan antes de emitir el primer `param`,
    /// de modo que los `param` de una llamada quedan contiguos.
    fn call(&mut self, procedure: &Located<Identifier>, args: &[Located<Expr>]) {
        let signature = match self.scopes.lookup(procedure.as_ref().as_ref()).cloned() {
            Some(symbol) => match symbol.of {
                Type::Procedure(signature) => Some(signature),
                _ => {
                    let error = SemanticError::ExpectedProcedure(procedure.as_ref().clone());
                    self.error(error, procedure);
                    None
                }
            },

            None => {
                self.error(SemanticError::Undefined(procedure.as_ref().clone()), procedure);
                None
            }
        };

        if let Some(signature) = &signature {
            if signature.params.len() != args.len() {
                let error = SemanticError::ArgumentCount(
                    procedure.as_ref().clone(),
                    signature.params.len(),
                    args.len(),
                );

                self.error(error, procedure);
            }
        }

        let mut actuals = Vec::with_capacity(args.len());
        for (index, arg) in args.iter().enumerate() {
            let formal = signature
                .as_ref()
                .and_then(|signature| signature.params.get(index));

            let passing = formal.map(|(_, passing)| *passing).unwrap_or(Passing::Value);
            let (operand, of) = match (passing, arg.as_ref()) {
                (Passing::Reference, Expr::Var(var)) => {
                    let (place, of) = self.place(var);
                    (place.operand(), of)
                }

                (Passing::Reference, _) => {
                    self.error(SemanticError::ExpectedReference, arg);
                    let (operand, _) = self.eval(arg);
                    (operand, None)
                }

                (Passing::Value, _) => self.eval(arg),
            };

            if let (Some((Some(expected), _)), Some(found)) = (formal, of) {
                if *expected != found {
                    self.error(SemanticError::ExpectedType(expected.clone(), found), arg);
                }
            }

            actuals.push((operand, passing));
        }

        for (operand, passing) in actuals {
            self.emit(Operator::Param(passing), operand, Operand::None, Operand::None);
        }

        let symbol = match &signature {
            Some(signature) => Operand::Name(signature.symbol.clone()),
            None => Operand::Name(procedure.as_ref().name()),
        };

        self.emit(Operator::Call, symbol, Operand::None, Operand::None);
    }
}
