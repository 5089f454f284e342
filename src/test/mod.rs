mod declarations;
mod expressions;
mod preprocessor;
mod util;
